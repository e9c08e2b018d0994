/// Failure injection for the in-memory host.
///
/// Real office documents refuse operations for reasons outside our control
/// (read-only documents, missing services, vetoed writes). The plan lets
/// callers reproduce those refusals deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// `create_frame` fails with `CreationRefused`.
    pub refuse_frame_creation: bool,
    /// After this many successful property writes every further write fails.
    pub fail_writes_after: Option<usize>,
    /// The document has no metadata repository.
    pub metadata_unsupported: bool,
}

impl FaultPlan {
    pub fn refuse_frames() -> Self {
        Self {
            refuse_frame_creation: true,
            ..Self::default()
        }
    }

    pub fn fail_after_writes(n: usize) -> Self {
        Self {
            fail_writes_after: Some(n),
            ..Self::default()
        }
    }

    /// Consumes one write from the budget. Returns false when the write must fail.
    pub(crate) fn allow_write(&mut self) -> bool {
        match self.fail_writes_after.as_mut() {
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
            None => true,
        }
    }
}
