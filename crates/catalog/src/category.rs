use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, Entity};

const MAX_NAME_LEN: usize = 100;

/// Product category, addressed by its slug over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Payload for creating a category. The slug is derived from the name when absent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Partial update of a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

impl NewCategory {
    pub fn into_category(self, id: CategoryId, now: DateTime<Utc>) -> DomainResult<Category> {
        let name = validate_name(&self.name)?;
        let slug = match self.slug {
            Some(s) => validate_slug(&s)?,
            None => {
                let derived = slugify(&name);
                if derived.is_empty() {
                    return Err(DomainError::validation(
                        "slug cannot be derived from name; supply one explicitly",
                    ));
                }
                derived
            }
        };

        Ok(Category {
            id,
            name,
            slug,
            description: self.description,
            created_at: now,
        })
    }
}

impl Category {
    pub fn apply(&mut self, patch: CategoryPatch) -> DomainResult<()> {
        // Validate everything before touching state.
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        let slug = patch.slug.as_deref().map(validate_slug).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(slug) = slug {
            self.slug = slug;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        Ok(())
    }

    /// Case-insensitive substring match over name and description.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.name.to_lowercase().contains(&term)
            || self.description.to_lowercase().contains(&term)
    }
}

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else collapse to `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_slug(slug: &str) -> DomainResult<String> {
    let slug = slug.trim();
    let well_formed = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !well_formed {
        return Err(DomainError::validation(format!(
            "invalid slug {slug:?}: use lowercase letters, digits and dashes"
        )));
    }
    Ok(slug.to_string())
}
