use std::fmt;

/// A registry image reference as it appears in registry notifications,
/// e.g. `gcr.io/my-project/my-image:latest` or `gcr.io/my-project/my-image@sha256:...`.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    MissingRegistry,
    MissingRepository,
    EmptyTag,
    EmptyDigest,
    InvalidFormat(String),
}

impl std::error::Error for ParseError {}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingRegistry => write!(f, "registry is missing"),
            ParseError::MissingRepository => write!(f, "repository is missing"),
            ParseError::EmptyTag => write!(f, "tag is empty"),
            ParseError::EmptyDigest => write!(f, "digest is empty"),
            ParseError::InvalidFormat(image) => write!(f, "invalid image format: {}", image),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl ImageReference {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (without_digest, digest) = match s.split_once('@') {
            Some((_, "")) => return Err(ParseError::EmptyDigest),
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (s, None),
        };

        // A tag is a colon after the last slash, otherwise the colon belongs to a registry port
        let (without_tag, tag) = match without_digest.rfind(':') {
            Some(pos) if pos > without_digest.rfind('/').unwrap_or(0) => {
                let tag = &without_digest[pos + 1..];
                if tag.is_empty() {
                    return Err(ParseError::EmptyTag);
                }
                (&without_digest[..pos], Some(tag.to_string()))
            }
            _ => (without_digest, None),
        };

        let (registry, repository) = without_tag
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidFormat(s.to_string()))?;

        if registry.is_empty() {
            return Err(ParseError::MissingRegistry);
        }
        if repository.is_empty() || repository.ends_with('/') {
            return Err(ParseError::MissingRepository);
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    /// Registry host and repository without tag or digest.
    pub fn path(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_reference() {
        let reference = ImageReference::parse("gcr.io/my-project/my-image:latest").unwrap();
        assert_eq!(reference.registry, "gcr.io");
        assert_eq!(reference.repository, "my-project/my-image");
        assert_eq!(reference.tag.as_deref(), Some("latest"));
        assert_eq!(reference.digest, None);
        assert_eq!(reference.path(), "gcr.io/my-project/my-image");
    }

    #[test]
    fn test_parse_digest_reference() {
        let reference =
            ImageReference::parse("eu.gcr.io/my-project/team/api@sha256:6ec128e26cd5").unwrap();
        assert_eq!(reference.registry, "eu.gcr.io");
        assert_eq!(reference.repository, "my-project/team/api");
        assert_eq!(reference.tag, None);
        assert_eq!(reference.digest.as_deref(), Some("sha256:6ec128e26cd5"));
    }

    #[test]
    fn test_parse_registry_with_port() {
        let reference = ImageReference::parse("localhost:5000/app").unwrap();
        assert_eq!(reference.registry, "localhost:5000");
        assert_eq!(reference.repository, "app");
        assert_eq!(reference.tag, None);
        assert_eq!(reference.to_string(), "localhost:5000/app");
    }

    #[test]
    fn test_parse_rejects_incomplete_references() {
        assert_eq!(
            ImageReference::parse("my-image:latest"),
            Err(ParseError::InvalidFormat("my-image:latest".to_string()))
        );
        assert_eq!(
            ImageReference::parse("/my-image"),
            Err(ParseError::MissingRegistry)
        );
        assert_eq!(
            ImageReference::parse("gcr.io/"),
            Err(ParseError::MissingRepository)
        );
        assert_eq!(
            ImageReference::parse("gcr.io/p/img:"),
            Err(ParseError::EmptyTag)
        );
        assert_eq!(
            ImageReference::parse("gcr.io/p/img@"),
            Err(ParseError::EmptyDigest)
        );
    }
}
