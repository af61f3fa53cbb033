use crate::shared::region::Region;

/// One recognized face in one frame: which identity, how sure, and where.
///
/// `location` is always in frame coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    pub label: i32,
    pub title: String,
    pub confidence: f64,
    pub location: Region,
}

impl Recognition {
    pub fn new(label: i32, title: impl Into<String>, confidence: f64, location: Region) -> Self {
        Self {
            label,
            title: title.into(),
            confidence,
            location,
        }
    }
}

impl std::fmt::Display for Recognition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({:.1}%) {}",
            self.label,
            self.title,
            self.confidence * 100.0,
            self.location
        )
    }
}
