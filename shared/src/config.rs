/// Port the relay listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 3000;

/// Endpoint native clients connect to when no URL is configured.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:3000/ws";

/// Animation a freshly spawned avatar plays before its first `move`.
pub const SPAWN_ANIM: &str = "faune-idle-down";

/// Where new participants appear in the office.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct SpawnPoint {
    pub x: f64,
    pub y: f64,
}

impl Default for SpawnPoint {
    fn default() -> Self {
        Self { x: 250.0, y: 300.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("spawn point ({x}, {y}) must be finite")]
pub struct InvalidSpawnPoint {
    pub x: f64,
    pub y: f64,
}

impl SpawnPoint {
    pub fn validate(&self) -> Result<(), InvalidSpawnPoint> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(InvalidSpawnPoint {
                x: self.x,
                y: self.y,
            });
        }
        Ok(())
    }
}
