#[derive(thiserror::Error, Debug)]
pub enum RollError {
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("modifier {0:?} was not offered for this roll")]
    UnknownModifier(String),
    #[error("damage part {0} is not configured for this roll")]
    UnknownPart(usize),
}

impl PartialEq for RollError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Json(a), Self::Json(b)) => a.to_string() == b.to_string(),
            (Self::UnknownModifier(a), Self::UnknownModifier(b)) => a == b,
            (Self::UnknownPart(a), Self::UnknownPart(b)) => a == b,
            _ => false,
        }
    }
}
