use serde::Serialize;

/// JSON shape printed for every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Envelope {
    /// Success with a payload.
    pub fn ok<D: Serialize>(message: impl Into<String>, data: &D) -> serde_json::Result<Self> {
        Ok(Self {
            success: true,
            message: message.into(),
            data: Some(serde_json::to_value(data)?),
        })
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}
