use std::sync::Arc;

use super::{Capture, CaptureOpener, CaptureOptions, SourceDescriptor, SyntheticOpener};
use crate::error::{RelayError, Result};

/// Opener installed in the server: dispatches a descriptor to a backend.
///
/// `test://` descriptors go to the built-in [`SyntheticOpener`]. Everything
/// else goes to the native backend if one was installed with
/// [`with_native`](Self::with_native). Without one, opening fails, and the
/// supervisor keeps retrying like it would for any unreachable camera.
#[derive(Clone, Default)]
pub struct SourceRouter {
    synthetic: SyntheticOpener,
    native: Option<Arc<dyn CaptureOpener>>,
}

impl SourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the backend used for every non-`test://` descriptor.
    pub fn with_native(mut self, opener: Arc<dyn CaptureOpener>) -> Self {
        self.native = Some(opener);
        self
    }

    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }
}

impl CaptureOpener for SourceRouter {
    fn open(
        &self,
        descriptor: &SourceDescriptor,
        options: &CaptureOptions,
    ) -> Result<Box<dyn Capture>> {
        if descriptor.scheme().as_deref() == Some(SyntheticOpener::SCHEME) {
            return self.synthetic.open(descriptor, options);
        }
        match &self.native {
            Some(native) => native.open(descriptor, options),
            None => Err(RelayError::Open {
                descriptor: descriptor.redacted(),
                reason: "no capture backend for this scheme (built without gstreamer?)".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Counters, ScriptedOpener};

    #[test]
    fn test_scheme_goes_to_synthetic() {
        let router = SourceRouter::new();
        let mut capture = router
            .open(&"test://bars?width=8&height=4&fps=0".into(), &CaptureOptions::default())
            .expect("synthetic source opens");
        let frame = capture.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
    }

    #[test]
    fn other_schemes_fail_without_backend() {
        let router = SourceRouter::new();
        assert!(!router.has_native());
        let err = router
            .open(&"rtsp://cam/stream".into(), &CaptureOptions::default())
            .err()
            .expect("no backend installed");
        assert!(matches!(err, RelayError::Open { .. }));
    }

    #[test]
    fn other_schemes_go_to_native() {
        let counters = Arc::new(Counters::default());
        let native = ScriptedOpener::new(counters.clone());
        let router = SourceRouter::new().with_native(Arc::new(native));
        assert!(router.has_native());
        router
            .open(&"rtsp://cam/stream".into(), &CaptureOptions::default())
            .expect("native backend opens");
        assert_eq!(counters.opens(), 1);
    }
}
