use crate::error::{Error, Result};
use git2::{Oid, Repository as Git2Repo};
use std::path::Path;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)
            .map_err(|e| Error::tag(format!("Not in a git repository: {}", e)))?;

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }
}

impl super::TagRepository for Git2Repository {
    fn head_oid(&self) -> Result<Oid> {
        let head = self
            .repo
            .head()
            .map_err(|e| Error::tag(format!("Cannot resolve HEAD: {}", e)))?;

        let commit = head
            .peel_to_commit()
            .map_err(|e| Error::tag(format!("HEAD does not point to a commit: {}", e)))?;

        Ok(commit.id())
    }

    fn find_tag_oid(&self, tag_name: &str) -> Result<Option<Oid>> {
        let reference_name = format!("refs/tags/{}", tag_name);

        match self.repo.find_reference(&reference_name) {
            Ok(reference) => {
                let oid = reference
                    .peel(git2::ObjectType::Any)
                    .map_err(|e| Error::tag(format!("Cannot peel tag: {}", e)))?
                    .id();

                Ok(Some(oid))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(Error::tag(format!("Cannot find tag '{}': {}", tag_name, e))),
        }
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        let tags = self.repo.tag_names(None)?;

        let mut names: Vec<String> = tags.iter().flatten().map(|s| s.to_string()).collect();
        names.sort();
        Ok(names)
    }

    fn create_tag(&self, name: &str, oid: Oid) -> Result<()> {
        let object = self
            .repo
            .find_object(oid, None)
            .map_err(|e| Error::tag(format!("Cannot find object: {}", e)))?;

        self.repo
            .tag_lightweight(name, &object, false)
            .map_err(|e| Error::tag(format!("Cannot create tag: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::TagRepository;

    fn repo_with_commit(dir: &Path) -> Git2Repo {
        let repo = Git2Repo::init(dir).unwrap();
        {
            let signature = git2::Signature::now("Test", "test@example.com").unwrap();
            let tree_id = repo.index().unwrap().write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &signature, &signature, "initial", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_create_and_find_tag() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Git2Repository::from_git2(repo_with_commit(dir.path()));

        let head = repo.head_oid().unwrap();
        assert_eq!(repo.find_tag_oid("1.0.0").unwrap(), None);

        repo.create_tag("1.0.0", head).unwrap();
        assert_eq!(repo.find_tag_oid("1.0.0").unwrap(), Some(head));
        assert_eq!(repo.list_tags().unwrap(), vec!["1.0.0".to_string()]);
    }

    #[test]
    fn test_duplicate_tag_fails() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Git2Repository::from_git2(repo_with_commit(dir.path()));
        let head = repo.head_oid().unwrap();

        repo.create_tag("1.0.0", head).unwrap();
        let err = repo.create_tag("1.0.0", head).unwrap_err();
        assert!(err.to_string().contains("Cannot create tag"));
    }

    #[test]
    fn test_unborn_head_fails() {
        let dir = tempfile::tempdir().unwrap();
        Git2Repo::init(dir.path()).unwrap();
        let repo = Git2Repository::open(dir.path()).unwrap();
        assert!(repo.head_oid().is_err());
    }
}
