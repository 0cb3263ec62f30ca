//! External collaborator contracts
//!
//! Household resolution/authorization and recipe metadata live in other
//! systems; this core consumes them through the two traits below and
//! never stores their data. The in-memory implementations stand in for
//! them in tests and the demo server.

use async_trait::async_trait;
use shared::plan::request::RecipeMeta;
use std::collections::HashMap;

use crate::plan::PlanError;

/// A sharing-group: the users who jointly view and edit one calendar
#[derive(Debug, Clone, PartialEq)]
pub struct Household {
    /// Stable group key, also the broadcast topic
    pub key: String,
    pub members: Vec<String>,
}

/// Authorization and sharing-group resolution collaborator
#[async_trait]
pub trait HouseholdDirectory: Send + Sync {
    /// The household a user belongs to, if any
    async fn household_of(&self, user_id: &str) -> Option<Household>;

    /// Confirm that actor and owner share a household; returns its key
    async fn assert_access(&self, actor: &str, owner: &str) -> Result<String, PlanError> {
        let actor_home = self.household_of(actor).await.ok_or_else(|| {
            PlanError::Forbidden(format!("user {} belongs to no household", actor))
        })?;
        if actor == owner {
            return Ok(actor_home.key);
        }
        let owner_home = self.household_of(owner).await.ok_or_else(|| {
            PlanError::Forbidden(format!("owner {} belongs to no household", owner))
        })?;
        if actor_home.key != owner_home.key {
            return Err(PlanError::Forbidden(format!(
                "user {} may not edit entries owned by {}",
                actor, owner
            )));
        }
        Ok(actor_home.key)
    }
}

/// Read-only recipe metadata collaborator
#[async_trait]
pub trait RecipeDirectory: Send + Sync {
    /// Displayable metadata for a recipe reference; `None` for dangling ids
    async fn recipe_meta(&self, recipe_id: &str) -> Option<RecipeMeta>;
}

/// Fixed user-to-household mapping
#[derive(Debug, Default)]
pub struct InMemoryHouseholds {
    by_user: HashMap<String, Household>,
}

impl InMemoryHouseholds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a household; its members resolve to it afterwards
    pub fn with_household(mut self, key: &str, members: &[&str]) -> Self {
        let home = Household {
            key: key.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        };
        for member in members {
            self.by_user.insert(member.to_string(), home.clone());
        }
        self
    }

    /// Two fixed households used by tests and the demo server:
    /// casa-verde (alice, bob) and loft-9 (carol)
    pub fn demo() -> Self {
        Self::new()
            .with_household("casa-verde", &["alice", "bob"])
            .with_household("loft-9", &["carol"])
    }
}

#[async_trait]
impl HouseholdDirectory for InMemoryHouseholds {
    async fn household_of(&self, user_id: &str) -> Option<Household> {
        self.by_user.get(user_id).cloned()
    }
}

/// Fixed recipe catalog
#[derive(Debug, Default)]
pub struct InMemoryRecipes {
    by_id: HashMap<String, RecipeMeta>,
}

impl InMemoryRecipes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipe(mut self, recipe_id: &str, meta: RecipeMeta) -> Self {
        self.by_id.insert(recipe_id.to_string(), meta);
        self
    }

    /// A small fixed catalog for tests and the demo server
    pub fn demo() -> Self {
        Self::new()
            .with_recipe(
                "tomato-soup",
                RecipeMeta {
                    name: "Tomato Soup".to_string(),
                    image: Some("/img/tomato-soup.jpg".to_string()),
                    servings: Some(4),
                    calories: Some(210),
                },
            )
            .with_recipe(
                "sunday-pancakes",
                RecipeMeta {
                    name: "Sunday Pancakes".to_string(),
                    image: None,
                    servings: Some(2),
                    calories: Some(540),
                },
            )
    }
}

#[async_trait]
impl RecipeDirectory for InMemoryRecipes {
    async fn recipe_meta(&self, recipe_id: &str) -> Option<RecipeMeta> {
        self.by_id.get(recipe_id).cloned()
    }
}
