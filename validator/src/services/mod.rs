//! Collaborators of the validator: the sheet it reads and writes, the identity
//! directory it queries, the notice texts it sends, and the result log it keeps.

pub mod directory;
pub mod history;
pub mod notices;
pub mod sheet;
