//! Objective-C message-send trampoline recognition and naming.
//!
//! Every selector referenced through `objc_msgSend` stubs gets a small
//! trampoline, five instructions long:
//!
//! ```text
//! adrp x16, ...    ; page of the selector reference
//! ldr  x16, [x16]  ; the selector
//! adrp x17, ...    ; page of objc_msgSend
//! ldr  x17, [x17]
//! br   x17
//! ```
//!
//! The scan starts from each selector string, follows its code references
//! into the stub region, confirms the shape at a few fixed offsets back
//! from the reference, and names the trampoline `_objc_sendMsg$<selector>`.

pub mod locator;
pub mod matcher;
pub mod reader;
pub mod scan;
pub mod selector;

#[cfg(test)]
pub(crate) mod testing;

pub use locator::{locate, CANDIDATE_OFFSETS};
pub use matcher::{matches, TRAMPOLINE_SHAPE, TRAMPOLINE_SIZE};
pub use reader::{read_instruction, INSTRUCTION_SIZE};
pub use scan::{scan, RenameRequest, ScanEvent, ScanOptions, ScanReport};
pub use selector::{sanitize, send_msg_name, SELECTOR_PREFIX, SEND_MSG_PREFIX};
