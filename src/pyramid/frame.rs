use std::fmt;
use std::sync::Arc;

/// Identifies one tile: the instance that stores it and its frame number.
///
/// Frame numbers follow DICOM and start at 1. The instance UID is shared so
/// references can be cloned into fetch tasks without copying strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameReference {
    instance_uid: Arc<str>,
    frame_index: u32,
}

impl FrameReference {
    /// Create a reference to frame `frame_index` (1-based) of an instance.
    pub fn new(instance_uid: impl Into<Arc<str>>, frame_index: u32) -> Self {
        Self {
            instance_uid: instance_uid.into(),
            frame_index,
        }
    }

    /// SOP Instance UID of the owning instance.
    #[inline]
    pub fn instance_uid(&self) -> &str {
        &self.instance_uid
    }

    /// 1-based frame number within the instance.
    #[inline]
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }
}

impl fmt::Display for FrameReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/frames/{}", self.instance_uid, self.frame_index)
    }
}
