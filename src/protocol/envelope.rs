//! 수신 메시지 봉투 파싱
//!
//! 클라이언트는 `{"type": ..., "data": {...}}` 형식으로 보내지만, 구버전 클라이언트는
//! 페이로드를 `data.data` 아래에 한 번 더 감싸거나 `type` 옆에 평면으로 둔다.
//! 세 위치를 한 번에 합쳐서 핸들러는 하나의 객체만 보게 한다.

use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// 파싱된 수신 봉투
#[derive(Debug, Clone)]
pub struct ClientEnvelope {
    pub kind: String,
    payload: Map<String, Value>,
    data_is_object: bool,
}

impl ClientEnvelope {
    /// 텍스트 프레임을 봉투로 파싱
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut root) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let kind = match root.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(ProtocolError::MissingType),
        };

        let mut payload = Map::new();
        let mut data_is_object = true;

        match root.remove("data") {
            None | Some(Value::Null) => {}
            Some(Value::Object(mut data)) => {
                let nested = match data.remove("data") {
                    Some(Value::Object(nested)) => Some(nested),
                    Some(other) => {
                        data.insert("data".to_string(), other);
                        None
                    }
                    None => None,
                };
                payload = data;
                if let Some(nested) = nested {
                    for (key, value) in nested {
                        payload.entry(key).or_insert(value);
                    }
                }
            }
            Some(_) => data_is_object = false,
        }

        // 평면 형식: type 옆의 나머지 필드
        for (key, value) in root {
            payload.entry(key).or_insert(value);
        }

        Ok(Self {
            kind,
            payload,
            data_is_object,
        })
    }

    /// 합쳐진 페이로드를 메시지 타입별 스키마로 디코딩
    pub fn decode<M: DeserializeOwned>(&self) -> Result<M, ProtocolError> {
        if !self.data_is_object {
            return Err(ProtocolError::DataNotObject(self.kind.clone()));
        }
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|source| {
            ProtocolError::InvalidPayload {
                kind: self.kind.clone(),
                source,
            }
        })
    }
}
