//! 라운드 설정 정규화
//!
//! 호스트가 보낸 설정에서 숫자 필드를 읽는다. 없거나 숫자가 아니면 게임 기본값,
//! 범위를 벗어나면 경계값으로 맞춘다.

use serde_json::{Map, Value};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Default)]
pub struct SettingsMap(Map<String, Value>);

impl SettingsMap {
    /// 구버전의 `gameSettings` 하위 객체는 최상위로 합친다 (최상위 값 우선)
    pub fn new(mut raw: Map<String, Value>) -> Self {
        if let Some(Value::Object(inner)) = raw.remove("gameSettings") {
            for (key, value) in inner {
                raw.entry(key).or_insert(value);
            }
        }
        Self(raw)
    }

    /// `keys` 중 처음 발견된 숫자 값. 별칭은 앞쪽이 우선
    pub fn number(&self, keys: &[&str], default: u64, range: RangeInclusive<u64>) -> u64 {
        keys.iter()
            .find_map(|key| self.0.get(*key).and_then(as_number))
            .map(|value| value.clamp(*range.start(), *range.end()))
            .unwrap_or(default)
    }

    pub fn number_u32(&self, keys: &[&str], default: u32, range: RangeInclusive<u32>) -> u32 {
        let range = u64::from(*range.start())..=u64::from(*range.end());
        // 범위가 u32 안이므로 변환은 실패하지 않는다
        u32::try_from(self.number(keys, u64::from(default), range)).unwrap_or(default)
    }
}

fn as_number(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.is_finite() {
        Some(f.max(0.0).round() as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: Value) -> SettingsMap {
        match value {
            Value::Object(map) => SettingsMap::new(map),
            _ => SettingsMap::default(),
        }
    }

    #[test]
    fn missing_or_non_numeric_fields_use_default() {
        let s = settings(json!({ "duration": "soon" }));
        assert_eq!(s.number(&["duration"], 60, 1..=3600), 60);
        assert_eq!(s.number(&["moleCount"], 9, 1..=64), 9);
    }

    #[test]
    fn aliases_are_read_in_order() {
        let s = settings(json!({ "gameTime": 30, "duration": 45 }));
        assert_eq!(s.number(&["duration", "gameTime"], 60, 1..=3600), 45);
        assert_eq!(s.number(&["gameTime", "duration"], 60, 1..=3600), 30);
    }

    #[test]
    fn values_are_clamped_and_rounded() {
        let s = settings(json!({ "numPairs": 80, "duration": 0, "spawnInterval": 1499.6 }));
        assert_eq!(s.number(&["numPairs"], 8, 1..=52), 52);
        assert_eq!(s.number(&["duration"], 60, 1..=3600), 1);
        assert_eq!(s.number(&["spawnInterval"], 1000, 100..=60_000), 1500);
    }

    #[test]
    fn nested_game_settings_are_merged() {
        let s = settings(json!({ "gameSettings": { "duration": 20, "moleCount": 12 }, "moleCount": 6 }));
        assert_eq!(s.number(&["duration"], 60, 1..=3600), 20);
        assert_eq!(s.number_u32(&["moleCount"], 9, 1..=64), 6);
    }
}
