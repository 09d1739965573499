use chrono::{DateTime, Utc};

// タイマー判定をテスト可能にするため、現在時刻の取得は trait 経由にする
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
