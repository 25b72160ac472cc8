//! Coherence resolution for requests reaching memory.
//!
//! Memory is the last level, so every grant is decided here without consulting sharers:
//!
//! | Request | Granted state | Touches memory |
//! |---|---|---|
//! | PUTS | Invalid | no (bypass) |
//! | PUTX | Invalid | yes |
//! | GETS | Shared with NOEXCL, else Exclusive | yes |
//! | GETX | Modified | yes |

use crate::request::{AccessType, MemRequest, MesiState, ReqFlags};

/// Outcome of resolving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// State to write back into the request.
    pub state: MesiState,
    /// The request completes immediately without bookkeeping or a backend access.
    pub bypass: bool,
}

/// Resolves the coherence state for a request type and its flags.
///
/// # Arguments
///
/// * `kind` - Request type.
/// * `flags` - Request flags; only `NOEXCL` is consulted.
///
/// # Returns
///
/// The granted state and whether the backend is bypassed.
pub const fn resolve(kind: AccessType, flags: ReqFlags) -> Resolution {
    match kind {
        AccessType::WritebackClean => Resolution {
            state: MesiState::Invalid,
            bypass: true,
        },
        AccessType::WritebackDirty => Resolution {
            state: MesiState::Invalid,
            bypass: false,
        },
        AccessType::ReadShared => Resolution {
            state: if flags.is(ReqFlags::NOEXCL) {
                MesiState::Shared
            } else {
                MesiState::Exclusive
            },
            bypass: false,
        },
        AccessType::ReadExclusive => Resolution {
            state: MesiState::Modified,
            bypass: false,
        },
    }
}

/// Resolves `req` in place and reports whether it bypasses memory.
pub const fn apply(req: &mut MemRequest) -> bool {
    let res = resolve(req.kind, req.flags);
    req.state = res.state;
    res.bypass
}
