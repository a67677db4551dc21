//! Line protocol between the fingerlink client and its server.
//!
//! Every message is UTF-8 text terminated by `\n`. The server drives the
//! session with bare command lines ([`ServerCommand`]); the client answers
//! with [`Outbound`] messages and waits for [`Feedback`] lines.
//!
//! | Direction | Lines |
//! |---|---|
//! | client → server | greeting after connect |
//! | server → client | `disconnect`, `reboot`, `enroll` + 8 request lines |
//! | client → server | `enrollFinger`, then metadata + id after capture |
//! | client → server | `scanFinger` + id on a match |
//! | server → client | `OK` or anything else; after a scan `OK`, the display name |

pub mod codec;
pub mod command;
pub mod enrollment;
pub mod feedback;
pub mod message;

pub use codec::LineCodec;
pub use command::ServerCommand;
pub use enrollment::parse_enrollment;
pub use feedback::Feedback;
pub use message::Outbound;
