//! Search service
//!
//! Runs the free-text and list-page paths end to end against a [`Catalog`].

use serde::Serialize;
use tracing::{debug, info};

use super::filter::{Filter, FormValues};
use crate::config::{Config, SearchConfig};
use crate::error::{Error, Result};
use crate::storage::{Catalog, Database, PartView};

/// What a free-text search resolved to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "parts", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// A part is named exactly like the query
    Exact(PartView),
    /// The filter matched a single part
    Single(PartView),
    /// Zero or several matches
    List(Vec<PartView>),
}

impl SearchOutcome {
    /// The part to jump straight to, if any
    pub fn redirect(&self) -> Option<&PartView> {
        match self {
            Self::Exact(part) | Self::Single(part) => Some(part),
            Self::List(_) => None,
        }
    }

    pub fn parts(&self) -> &[PartView] {
        match self {
            Self::Exact(part) | Self::Single(part) => std::slice::from_ref(part),
            Self::List(parts) => parts,
        }
    }
}

/// One page of the parts list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    pub parts: Vec<PartView>,
    pub filter: Filter,
    pub current_page: u32,
    /// Encoded form for the previous page, absent on the first page
    pub prev_query: Option<String>,
    /// Encoded form for the next page, absent when this page is short
    pub next_query: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchService {
    catalog: Catalog,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(catalog: Catalog, config: SearchConfig) -> Self {
        Self { catalog, config }
    }

    /// Build a service over an open database using validated settings
    pub fn from_config(db: &Database, config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        Ok(Self::new(db.catalog(), config.search.clone()))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Resolve a free-text query.
    ///
    /// An exact name match wins before the query is parsed at all.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        let trimmed = query.trim();
        if !trimmed.is_empty() {
            if let Some(part) = self.catalog.find_by_name(trimmed).await? {
                info!(id = part.id, "Search matched part name exactly");
                return Ok(SearchOutcome::Exact(part));
            }
        }

        let (filter, compiled) = super::compile_query(query, &self.config).await?;
        debug!(?filter, "Built search filter");

        let mut parts = self.catalog.fetch(&compiled).await?;
        info!(matches = parts.len(), "Search completed");

        if parts.len() == 1 {
            if let Some(part) = parts.pop() {
                return Ok(SearchOutcome::Single(part));
            }
        }
        Ok(SearchOutcome::List(parts))
    }

    /// Run the list-page path for the given form fields
    pub async fn list(&self, form: &FormValues) -> Result<ListPage> {
        let (filter, compiled) = super::compile_form(form, &self.config)?;
        let parts = self.catalog.fetch(&compiled).await?;

        let current_page = filter.page.unwrap_or(0);
        let prev_query = current_page
            .checked_sub(1)
            .map(|page| form.with_replaced("page", page.to_string()).encode());
        let next_query = (parts.len() >= compiled.limit as usize)
            .then(|| form.with_replaced("page", (current_page + 1).to_string()).encode());

        info!(
            page = current_page,
            matches = parts.len(),
            "Listed parts"
        );

        Ok(ListPage {
            parts,
            filter,
            current_page,
            prev_query,
            next_query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::error::SearchError;
    use crate::storage::NewPart;

    async fn service(page_size: u32) -> (Database, SearchService) {
        let db = Database::in_memory().await.unwrap();
        let mut config = Config::default();
        config.search.page_size = page_size;
        let service = SearchService::from_config(&db, &config).unwrap();

        let catalog = service.catalog();
        let resistors = catalog
            .insert_category("Resistor", Some("Ohm"), Some("Ω"))
            .await
            .unwrap();
        let transistors = catalog
            .insert_category("Transistor", None, None)
            .await
            .unwrap();

        for (name, value) in [("R 1k", 1e3), ("R 2k2", 2.2e3), ("R 4k7", 4.7e3)] {
            catalog
                .insert_part(&NewPart::new(name, resistors).with_value(value).with_amount(10))
                .await
                .unwrap();
        }
        catalog
            .insert_part(&NewPart::new("BC547", transistors).with_amount(3))
            .await
            .unwrap();

        (db, service)
    }

    #[tokio::test]
    async fn test_exact_name_wins() {
        let (_db, service) = service(10).await;
        let outcome = service.search("  BC547 ").await.unwrap();
        assert!(matches!(outcome, SearchOutcome::Exact(ref p) if p.name == "BC547"));
        assert_eq!(outcome.redirect().unwrap().id, 4);
    }

    #[tokio::test]
    async fn test_single_match_redirects() {
        let (_db, service) = service(10).await;
        let outcome = service.search("2.2k").await.unwrap();
        assert!(matches!(outcome, SearchOutcome::Single(ref p) if p.name == "R 2k2"));
    }

    #[tokio::test]
    async fn test_several_matches_list() {
        let (_db, service) = service(10).await;
        let outcome = service.search("R").await.unwrap();
        assert!(outcome.redirect().is_none());
        assert_eq!(outcome.parts().len(), 3);

        let outcome = service.search("nothing-like-this").await.unwrap();
        assert_eq!(outcome, SearchOutcome::List(Vec::new()));
    }

    #[tokio::test]
    async fn test_search_error_propagates() {
        let (_db, service) = service(10).await;
        let err = service.search("R [kΩ").await.unwrap_err();
        match err {
            Error::Search(e) => assert!(matches!(
                e.root_cause(),
                SearchError::UnterminatedBracket { delimiter: '[', .. }
            )),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_list_pages() {
        let (_db, service) = service(2).await;

        let first = service.list(&FormValues::new()).await.unwrap();
        assert_eq!(first.current_page, 0);
        assert_eq!(first.parts.len(), 2);
        assert_eq!(first.prev_query, None);
        assert_eq!(first.next_query.as_deref(), Some("page=1"));

        let form = FormValues::parse(first.next_query.as_deref().unwrap());
        let second = service.list(&form).await.unwrap();
        assert_eq!(second.current_page, 1);
        assert_eq!(second.parts.len(), 2);
        assert_eq!(second.prev_query.as_deref(), Some("page=0"));
        assert_eq!(second.next_query.as_deref(), Some("page=2"));

        let third = service.list(&FormValues::parse("page=2")).await.unwrap();
        assert!(third.parts.is_empty());
        assert_eq!(third.next_query, None);
    }

    #[tokio::test]
    async fn test_list_keeps_other_fields_in_links() {
        let (_db, service) = service(10).await;
        let form = FormValues::parse("category=1&value=1k-3k");
        let page = service.list(&form).await.unwrap();

        let names: Vec<&str> = page.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["R 2k2", "R 1k"]);
        assert_eq!(page.next_query, None);
        assert_eq!(page.prev_query, None);

        let page = service
            .list(&form.with_replaced("page", "1"))
            .await
            .unwrap();
        assert_eq!(
            page.prev_query.as_deref(),
            Some("category=1&value=1k-3k&page=0")
        );
    }

    #[tokio::test]
    async fn test_list_reports_bad_value_field() {
        let (_db, service) = service(10).await;
        let err = service
            .list(&FormValues::parse("value=abc"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E1303");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let mut config = Config::default();
        config.search.page_size = 0;

        let err = SearchService::from_config(&db, &config).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
