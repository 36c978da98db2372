//! Content repository backed by the SQLite content tables.

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};

use super::{
    ContentItem, ContentRepository, Corpus, ItemId, ItemQuery, KindFilter, Permalinks, Taxonomy,
    Term, UrlTarget,
};
use crate::db::Db;
use crate::error::{GraphviewError, Result};

const ITEM_COLUMNS: &str = "id, title, kind, slug, body, excerpt, parent_id";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ContentItem> {
    Ok(ContentItem {
        id: row.get(0)?,
        title: row.get(1)?,
        kind: row.get(2)?,
        slug: row.get(3)?,
        body: row.get(4)?,
        excerpt: row.get(5)?,
        parent_id: row.get(6)?,
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Row counts written by [`SqliteContentRepository::import_corpus`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub items: usize,
    pub taxonomies: usize,
    pub terms: usize,
    pub assignments: usize,
}

pub struct SqliteContentRepository {
    db: Db,
    permalinks: Permalinks,
}

impl SqliteContentRepository {
    pub fn new(db: Db, permalinks: Permalinks) -> Self {
        Self { db, permalinks }
    }

    /// Write a corpus into the content tables. Items, taxonomies and terms are
    /// updated in place (no REPLACE: deletes would cascade into term
    /// assignments). Term assignments of the imported items and taxonomy
    /// registrations of the imported kinds are replaced by the corpus.
    pub async fn import_corpus(&self, corpus: Corpus) -> Result<ImportStats> {
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let mut stats = ImportStats::default();
                let mut positions: HashMap<String, i64> = HashMap::new();

                let kinds: HashSet<&str> = corpus
                    .taxonomies
                    .iter()
                    .flat_map(|def| def.kinds.iter())
                    .chain(corpus.items.iter().map(|item| &item.kind))
                    .map(String::as_str)
                    .collect();
                for kind in &kinds {
                    tx.execute("DELETE FROM taxonomy_kinds WHERE kind = ?1", [kind])?;
                }

                let items: HashSet<ItemId> = corpus
                    .items
                    .iter()
                    .map(|item| item.id)
                    .chain(corpus.assignments.iter().map(|a| a.item))
                    .collect();
                for item in &items {
                    tx.execute("DELETE FROM item_terms WHERE item_id = ?1", [item])?;
                }

                for def in &corpus.taxonomies {
                    tx.execute(
                        "INSERT INTO taxonomies (name, label) VALUES (?1, ?2) \
                         ON CONFLICT(name) DO UPDATE SET label = excluded.label",
                        params![def.name, def.label],
                    )?;
                    for kind in &def.kinds {
                        let position = positions.entry(kind.clone()).or_insert(0);
                        tx.execute(
                            "INSERT INTO taxonomy_kinds (taxonomy, kind, position) VALUES (?1, ?2, ?3) \
                             ON CONFLICT(taxonomy, kind) DO UPDATE SET position = excluded.position",
                            params![def.name, kind, *position],
                        )?;
                        *position += 1;
                    }
                    stats.taxonomies += 1;
                }

                for term in &corpus.terms {
                    tx.execute(
                        "INSERT INTO terms (id, taxonomy, name) VALUES (?1, ?2, ?3) \
                         ON CONFLICT(id) DO UPDATE SET taxonomy = excluded.taxonomy, name = excluded.name",
                        params![term.id, term.taxonomy, term.name],
                    )?;
                    stats.terms += 1;
                }

                for item in &corpus.items {
                    tx.execute(
                        r#"
                        INSERT INTO items (id, title, kind, slug, body, excerpt, parent_id)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                        ON CONFLICT(id) DO UPDATE SET
                            title = excluded.title,
                            kind = excluded.kind,
                            slug = excluded.slug,
                            body = excluded.body,
                            excerpt = excluded.excerpt,
                            parent_id = excluded.parent_id
                        "#,
                        params![
                            item.id,
                            item.title,
                            item.kind,
                            item.slug,
                            item.body,
                            item.excerpt,
                            item.parent_id,
                        ],
                    )?;
                    stats.items += 1;
                }

                for assignment in &corpus.assignments {
                    for term in &assignment.terms {
                        stats.assignments += tx.execute(
                            "INSERT OR IGNORE INTO item_terms (item_id, term_id) VALUES (?1, ?2)",
                            params![assignment.item, term],
                        )?;
                    }
                }

                tx.commit()?;
                Ok(stats)
            })
            .await
    }

    async fn find_by_slug(&self, slug: String) -> Result<Option<ItemId>> {
        self.db
            .with_connection(move |conn| {
                Ok(conn
                    .query_row("SELECT id FROM items WHERE slug = ?1", [&slug], |row| row.get(0))
                    .optional()?)
            })
            .await
    }

    async fn query_items(&self, sql: String, values: Vec<Value>) -> Result<Vec<ContentItem>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let items = stmt
                    .query_map(params_from_iter(values), item_from_row)?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(items)
            })
            .await
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn list_items(&self, kinds: &[String]) -> Result<Vec<ContentItem>> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM items WHERE kind IN ({}) ORDER BY id",
            ITEM_COLUMNS,
            placeholders(kinds.len())
        );
        let values = kinds.iter().cloned().map(Value::Text).collect();
        self.query_items(sql, values).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<ContentItem>> {
        let sql = format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS);
        self.db
            .with_connection(move |conn| {
                Ok(conn.query_row(&sql, [id], item_from_row).optional()?)
            })
            .await
    }

    async fn list_children(&self, parent_id: ItemId, kind: &str) -> Result<Vec<ContentItem>> {
        let sql = format!(
            "SELECT {} FROM items WHERE parent_id = ?1 AND kind = ?2 ORDER BY id",
            ITEM_COLUMNS
        );
        self.query_items(sql, vec![Value::Integer(parent_id), Value::Text(kind.to_string())])
            .await
    }

    async fn resolve_url(&self, url: &str) -> Result<Option<ItemId>> {
        match self.permalinks.parse(url) {
            Some(UrlTarget::Id(id)) => Ok(self.get_item(id).await?.map(|item| item.id)),
            Some(UrlTarget::Slug(slug)) => self.find_by_slug(slug).await,
            None => Ok(None),
        }
    }

    fn permalink(&self, item: &ContentItem) -> String {
        self.permalinks.canonical(&item.slug)
    }

    async fn taxonomies_for_kind(&self, kind: &str) -> Result<Vec<Taxonomy>> {
        let kind = kind.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.name, t.label FROM taxonomy_kinds tk \
                     JOIN taxonomies t ON t.name = tk.taxonomy \
                     WHERE tk.kind = ?1 ORDER BY tk.position",
                )?;
                let taxonomies = stmt
                    .query_map([&kind], |row| {
                        Ok(Taxonomy {
                            name: row.get(0)?,
                            label: row.get(1)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(taxonomies)
            })
            .await
    }

    async fn item_terms(&self, item_id: ItemId, taxonomy: &str) -> Result<Vec<Term>> {
        let taxonomy = taxonomy.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.id, t.name FROM item_terms it \
                     JOIN terms t ON t.id = it.term_id \
                     WHERE it.item_id = ?1 AND t.taxonomy = ?2 ORDER BY it.rowid",
                )?;
                let terms = stmt
                    .query_map(params![item_id, taxonomy], |row| {
                        Ok(Term {
                            id: row.get(0)?,
                            name: row.get(1)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(terms)
            })
            .await
    }

    async fn search_items(&self, query: &ItemQuery) -> Result<Vec<ContentItem>> {
        let limit = i64::try_from(query.limit)
            .map_err(|_| GraphviewError::InvalidInput(format!("search limit too large: {}", query.limit)))?;

        let mut sql = format!("SELECT {} FROM items i WHERE 1 = 1", ITEM_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let KindFilter::Only(kinds) = &query.kinds {
            if kinds.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND i.kind IN ({})", placeholders(kinds.len())));
            values.extend(kinds.iter().cloned().map(Value::Text));
        }
        if !query.exclude.is_empty() {
            sql.push_str(&format!(" AND i.id NOT IN ({})", placeholders(query.exclude.len())));
            values.extend(query.exclude.iter().copied().map(Value::Integer));
        }
        if let Some(needle) = &query.body_contains {
            // instr() keeps the match literal; LIKE would treat % and _ as wildcards
            sql.push_str(" AND instr(i.body, ?) > 0");
            values.push(Value::Text(needle.clone()));
        }
        if !query.term_ids.is_empty() {
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM item_terms it WHERE it.item_id = i.id AND it.term_id IN ({}))",
                placeholders(query.term_ids.len())
            ));
            values.extend(query.term_ids.iter().copied().map(Value::Integer));
        }
        sql.push_str(" ORDER BY i.id LIMIT ?");
        values.push(Value::Integer(limit));

        self.query_items(sql, values).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CORPUS: &str = r#"{
        "items": [
            {"id": 1, "title": "Home", "kind": "page", "slug": "home", "body": "Welcome"},
            {"id": 2, "title": "About", "kind": "page", "slug": "about", "parent_id": 1,
             "body": "<a href=\"https://example.com/home/\">home</a>"},
            {"id": 3, "title": "Launch", "kind": "post", "slug": "launch", "excerpt": "We launched"},
            {"id": 4, "title": "Update", "kind": "post", "slug": "update",
             "body": "see https://example.com/launch/ 100%"}
        ],
        "taxonomies": [
            {"name": "category", "label": "Category", "kinds": ["post"]},
            {"name": "post_tag", "kinds": ["post", "page"]}
        ],
        "terms": [
            {"id": 10, "taxonomy": "category", "name": "News"},
            {"id": 11, "taxonomy": "post_tag", "name": "release"}
        ],
        "assignments": [
            {"item": 3, "terms": [10, 11]},
            {"item": 4, "terms": [10]}
        ]
    }"#;

    async fn setup() -> (SqliteContentRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("content.db"));
        db.migrate().await.unwrap();
        let repo = SqliteContentRepository::new(db, Permalinks::new("https://example.com").unwrap());
        let stats = repo.import_corpus(Corpus::from_json(CORPUS).unwrap()).await.unwrap();
        assert_eq!(
            stats,
            ImportStats { items: 4, taxonomies: 2, terms: 2, assignments: 3 }
        );
        (repo, temp_dir)
    }

    #[tokio::test]
    async fn test_list_items_by_kind() {
        let (repo, _temp) = setup().await;
        let posts = repo.list_items(&["post".to_string()]).await.unwrap();
        assert_eq!(posts.iter().map(|i| i.id).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(posts[0].excerpt, "We launched");
        assert!(repo.list_items(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_item_and_children() {
        let (repo, _temp) = setup().await;
        let about = repo.get_item(2).await.unwrap().unwrap();
        assert_eq!(about.parent_id, Some(1));
        assert!(repo.get_item(99).await.unwrap().is_none());

        let children = repo.list_children(1, "page").await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, 2);
        assert!(repo.list_children(1, "post").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_url() {
        let (repo, _temp) = setup().await;
        assert_eq!(repo.resolve_url("https://example.com/home/").await.unwrap(), Some(1));
        assert_eq!(repo.resolve_url("/?p=4").await.unwrap(), Some(4));
        assert_eq!(repo.resolve_url("/missing/").await.unwrap(), None);
        assert_eq!(repo.resolve_url("https://elsewhere.org/home/").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_taxonomies_keep_registration_order_and_missing_labels() {
        let (repo, _temp) = setup().await;
        let post_taxonomies = repo.taxonomies_for_kind("post").await.unwrap();
        assert_eq!(post_taxonomies.len(), 2);
        assert_eq!(post_taxonomies[0].name, "category");
        assert_eq!(post_taxonomies[1].label, None);
        assert!(repo.taxonomies_for_kind("recipe").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_item_terms() {
        let (repo, _temp) = setup().await;
        let terms = repo.item_terms(3, "post_tag").await.unwrap();
        assert_eq!(terms, vec![Term { id: 11, name: "release".to_string() }]);
        assert!(repo.item_terms(4, "post_tag").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_items() {
        let (repo, _temp) = setup().await;

        let incoming = repo
            .search_items(&ItemQuery::new(10).excluding(3).body_contains("https://example.com/launch/"))
            .await
            .unwrap();
        assert_eq!(incoming.iter().map(|i| i.id).collect::<Vec<_>>(), vec![4]);

        let literal = repo
            .search_items(&ItemQuery::new(10).body_contains("0%"))
            .await
            .unwrap();
        assert_eq!(literal.len(), 1);

        let related = repo
            .search_items(&ItemQuery::new(10).kind("post").excluding(3).with_any_term([10, 11]))
            .await
            .unwrap();
        assert_eq!(related.iter().map(|i| i.id).collect::<Vec<_>>(), vec![4]);

        let capped = repo.search_items(&ItemQuery::new(1)).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_import_is_repeatable() {
        let (repo, _temp) = setup().await;
        let again = repo.import_corpus(Corpus::from_json(CORPUS).unwrap()).await.unwrap();
        assert_eq!(again.items, 4);
        assert_eq!(again.assignments, 3);
        assert_eq!(repo.item_terms(3, "category").await.unwrap().len(), 1);
        assert_eq!(repo.taxonomies_for_kind("post").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reimport_drops_removed_assignments_and_registrations() {
        let (repo, _temp) = setup().await;

        // Item 4 loses its category and post_tag is no longer registered for posts.
        let shrunk = CORPUS
            .replace(r#"{"item": 4, "terms": [10]}"#, r#"{"item": 4, "terms": []}"#)
            .replace(r#""kinds": ["post", "page"]"#, r#""kinds": ["page"]"#);
        repo.import_corpus(Corpus::from_json(&shrunk).unwrap()).await.unwrap();

        assert!(repo.item_terms(4, "category").await.unwrap().is_empty());
        assert_eq!(repo.item_terms(3, "category").await.unwrap().len(), 1);
        let related = repo
            .search_items(&ItemQuery::new(10).kind("post").excluding(3).with_any_term([10]))
            .await
            .unwrap();
        assert!(related.is_empty());

        let post_taxonomies = repo.taxonomies_for_kind("post").await.unwrap();
        assert_eq!(post_taxonomies.len(), 1);
        assert_eq!(post_taxonomies[0].name, "category");
        assert_eq!(repo.taxonomies_for_kind("page").await.unwrap().len(), 1);
    }
}
