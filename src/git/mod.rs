//! Git tagging abstraction
//!
//! The `release` target only needs to read HEAD and create a lightweight
//! tag. [`TagRepository`] captures exactly that, with two implementations:
//!
//! - [repository::Git2Repository]: a real repository through the `git2` crate
//! - [mock::MockRepository]: an in-memory stand-in for tests
//!
//! ```rust
//! # use minidb::git::TagRepository;
//! # fn example<R: TagRepository>(repo: &R) -> minidb::Result<()> {
//! let head = repo.head_oid()?;
//! if repo.find_tag_oid("2.0.1")?.is_none() {
//!     repo.create_tag("2.0.1", head)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::Result;
use git2::Oid;

/// Git operations used by the release target.
///
/// Implementations map underlying errors to [crate::Error] variants:
/// missing objects and tag conflicts become [crate::Error::Tag].
pub trait TagRepository {
    /// Commit currently checked out
    ///
    /// # Returns
    /// * `Ok(Oid)` - Object ID of the HEAD commit
    /// * `Err` - If HEAD is unborn or detached from any commit
    fn head_oid(&self) -> Result<Oid>;

    /// Find a tag by name and get the OID it points to
    ///
    /// Handles both lightweight and annotated tags.
    ///
    /// # Returns
    /// * `Ok(Some(Oid))` - Object ID of the tag if it exists
    /// * `Ok(None)` - If the tag doesn't exist
    fn find_tag_oid(&self, tag_name: &str) -> Result<Option<Oid>>;

    /// All tag names, sorted alphabetically
    fn list_tags(&self) -> Result<Vec<String>>;

    /// Create a lightweight tag at given OID
    ///
    /// Fails if the tag already exists.
    fn create_tag(&self, name: &str, oid: Oid) -> Result<()>;
}
