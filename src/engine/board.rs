//! 일시적 엔티티 보드
//!
//! 떨어지는 아이템, 두더지처럼 스폰되고 만료되는 엔티티를 관리한다.
//! 슬롯이 있는 보드는 비어 있는 슬롯 중 하나를 균등하게 고른다.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// 가중치 구간 하나 (예: small 70%, 1~5점)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tier {
    pub name: &'static str,
    pub weight: f64,
    pub min: u32,
    pub max: u32,
}

/// 구간별 가중치 분포. 구간을 먼저 고르고 그 안에서 값을 균등하게 뽑는다
#[derive(Debug, Clone)]
pub struct ValueDistribution {
    tiers: Vec<Tier>,
}

impl ValueDistribution {
    pub fn new(tiers: Vec<Tier>) -> Self {
        if tiers.is_empty() {
            return Self::fixed(1);
        }
        Self { tiers }
    }

    pub fn fixed(value: u32) -> Self {
        Self {
            tiers: vec![Tier {
                name: "fixed",
                weight: 1.0,
                min: value,
                max: value,
            }],
        }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> (Tier, u32) {
        let total: f64 = self.tiers.iter().map(|t| t.weight.max(0.0)).sum();
        let mut roll = rng.gen::<f64>() * total;
        let mut chosen = self.tiers[self.tiers.len() - 1];
        for tier in &self.tiers {
            let weight = tier.weight.max(0.0);
            if roll < weight {
                chosen = *tier;
                break;
            }
            roll -= weight;
        }
        let (low, high) = (chosen.min.min(chosen.max), chosen.min.max(chosen.max));
        (chosen, rng.gen_range(low..=high))
    }
}

#[derive(Debug, Clone)]
pub struct Entity<T> {
    pub id: String,
    pub slot: Option<usize>,
    pub value: u32,
    pub spawned_at: Instant,
    pub lifetime: Duration,
    /// 수집/타격 처리됨 (정리 대기 중)
    pub resolved: bool,
    pub data: T,
}

#[derive(Debug)]
pub struct EntityBoard<T> {
    prefix: &'static str,
    slots: Vec<bool>,
    entities: Vec<Entity<T>>,
    max_live: usize,
    next_seq: u64,
}

impl<T> EntityBoard<T> {
    /// 고정 슬롯 보드 (두더지 구멍)
    pub fn with_slots(prefix: &'static str, slot_count: usize, max_live: usize) -> Self {
        Self {
            prefix,
            slots: vec![false; slot_count],
            entities: Vec::new(),
            max_live: max_live.min(slot_count),
            next_seq: 0,
        }
    }

    /// 좌표 기반 보드 (떨어지는 아이템)
    pub fn unslotted(prefix: &'static str, max_live: usize) -> Self {
        Self {
            prefix,
            slots: Vec::new(),
            entities: Vec::new(),
            max_live,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_full(&self) -> bool {
        self.entities.len() >= self.max_live
            || (!self.slots.is_empty() && self.slots.iter().all(|occupied| *occupied))
    }

    pub fn free_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, occupied)| !**occupied)
            .map(|(slot, _)| slot)
            .collect()
    }

    /// 상한 미만이면 새 엔티티를 만들고 슬롯을 점유한다
    pub fn spawn<R, F>(
        &mut self,
        rng: &mut R,
        now: Instant,
        value: u32,
        lifetime: Duration,
        make: F,
    ) -> Option<&Entity<T>>
    where
        R: Rng + ?Sized,
        F: FnOnce(&str, Option<usize>) -> T,
    {
        if self.is_full() {
            return None;
        }

        let slot = if self.slots.is_empty() {
            None
        } else {
            let slot = *self.free_slots().choose(rng)?;
            self.slots[slot] = true;
            Some(slot)
        };

        self.next_seq += 1;
        let id = format!("{}_{}", self.prefix, self.next_seq);
        let data = make(&id, slot);
        self.entities.push(Entity {
            id,
            slot,
            value,
            spawned_at: now,
            lifetime,
            resolved: false,
            data,
        });
        self.entities.last()
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity<T>> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// 엔티티 제거 및 슬롯 해제
    pub fn remove(&mut self, id: &str) -> Option<Entity<T>> {
        let index = self.entities.iter().position(|e| e.id == id)?;
        let entity = self.entities.remove(index);
        self.release(entity.slot);
        Some(entity)
    }

    /// 만료 타이머를 놓친 엔티티 정리. 수명에 `grace`를 더한 나이가 지나면 제거
    pub fn sweep(&mut self, now: Instant, grace: Duration) -> Vec<Entity<T>> {
        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entities)
            .into_iter()
            .partition(|e| now.saturating_duration_since(e.spawned_at) >= e.lifetime + grace);
        self.entities = live;
        for entity in &expired {
            self.release(entity.slot);
        }
        expired
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.slots.iter_mut().for_each(|occupied| *occupied = false);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity<T>> {
        self.entities.iter()
    }

    fn release(&mut self, slot: Option<usize>) {
        if let Some(occupied) = slot.and_then(|s| self.slots.get_mut(s)) {
            *occupied = false;
        }
    }
}
