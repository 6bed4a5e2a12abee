use crate::{model::Reading, Error, Result};

/// Turns a record into message bytes.
pub trait RecordEncoder: Send + Sync + 'static {
    fn encode(&self, reading: &Reading) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn serialize(reading: &Reading) -> Result<Vec<u8>> {
        // serde_json writes non-finite floats as null, which consumers reject
        if !reading.consumption_kwh.is_finite() {
            return Err(Error::InvalidRecord {
                message: format!(
                    "reading {} has non-finite consumption {}",
                    reading.id, reading.consumption_kwh
                ),
            });
        }
        serde_json::to_vec(reading).map_err(Into::into)
    }
}

impl RecordEncoder for JsonSerializer {
    fn encode(&self, reading: &Reading) -> Result<Vec<u8>> {
        Self::serialize(reading)
    }
}
