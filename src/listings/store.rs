//! Listing Storage
//! Mission: Persist listings and run predicates built by the query builder

use crate::db::SharedConnection;
use crate::listings::models::{Listing, ListingView, NewListing, OwnerSummary};
use crate::listings::query::{fold_case, ListingQuery};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

const VIEW_SELECT: &str = "SELECT l.id, l.title, l.location, l.price, l.bedrooms, l.description,
        l.image_url, l.contact, l.owner_id, l.available, l.created_at, l.updated_at,
        u.name, u.email, u.phone
    FROM listings l
    JOIN users u ON u.id = l.owner_id";

/// Listing storage with SQLite backend
pub struct ListingStore {
    conn: SharedConnection,
}

impl ListingStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Insert a listing owned by `owner`
    pub fn create(&self, owner: &Uuid, new_listing: NewListing) -> Result<Listing> {
        let now = timestamp();
        let listing = Listing {
            id: Uuid::new_v4(),
            title: new_listing.title,
            location: new_listing.location,
            price: new_listing.price,
            bedrooms: new_listing.bedrooms,
            description: new_listing.description,
            image_url: new_listing.image_url,
            contact: new_listing.contact,
            owner: *owner,
            available: true,
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO listings (id, title, location, location_folded, price, bedrooms,
                                   description, image_url, contact, owner_id, available,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                listing.id.to_string(),
                listing.title,
                listing.location,
                fold_case(&listing.location),
                listing.price,
                listing.bedrooms,
                listing.description,
                listing.image_url,
                listing.contact,
                listing.owner.to_string(),
                listing.available,
                listing.created_at,
                listing.updated_at,
            ],
        )
        .context("Failed to insert listing")?;

        info!(listing_id = %listing.id, owner_id = %owner, "Created listing");
        Ok(listing)
    }

    /// Fetch one listing with its owner's contact details
    pub fn get(&self, id: &Uuid) -> Result<Option<ListingView>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE l.id = ?1", VIEW_SELECT),
            params![id.to_string()],
            view_from_row,
        )
        .optional()
        .context("Failed to load listing")
    }

    /// Fetch one listing without joining the owner
    pub fn get_listing(&self, id: &Uuid) -> Result<Option<Listing>> {
        Ok(self.get(id)?.map(Listing::from))
    }

    /// Run a built query
    pub fn find(&self, query: &ListingQuery) -> Result<Vec<ListingView>> {
        let (clause_sql, values) = query.to_sql();
        let sql = format!("{} {}", VIEW_SELECT, clause_sql);
        debug!(sql = %sql, params = values.len(), "Listing query");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).context("Failed to prepare listing query")?;
        let listings = stmt
            .query_map(params_from_iter(values.iter()), view_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read listings")?;

        Ok(listings)
    }

    /// Persist every mutable field of `listing`. Owner and creation time are
    /// never written. Returns the refreshed `updated_at`.
    pub fn update(&self, listing: &Listing) -> Result<String> {
        let updated_at = timestamp();

        let conn = self.conn.lock();
        conn.execute(
            "UPDATE listings
             SET title = ?1, location = ?2, location_folded = ?3, price = ?4, bedrooms = ?5,
                 description = ?6, image_url = ?7, contact = ?8, available = ?9,
                 updated_at = ?10
             WHERE id = ?11",
            params![
                listing.title,
                listing.location,
                fold_case(&listing.location),
                listing.price,
                listing.bedrooms,
                listing.description,
                listing.image_url,
                listing.contact,
                listing.available,
                updated_at,
                listing.id.to_string(),
            ],
        )
        .context("Failed to update listing")?;

        info!(listing_id = %listing.id, "Updated listing");
        Ok(updated_at)
    }

    /// Delete a listing. Returns false if it did not exist.
    pub fn delete(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn
            .execute("DELETE FROM listings WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete listing")?;

        if rows_affected > 0 {
            info!(listing_id = %id, "Deleted listing");
        }
        Ok(rows_affected > 0)
    }

    /// Distinct locations among available listings, sorted
    pub fn available_locations(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT location FROM listings WHERE available = 1 ORDER BY location ASC",
        )?;
        let locations = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .context("Failed to read locations")?;
        Ok(locations)
    }
}

impl From<ListingView> for Listing {
    fn from(view: ListingView) -> Self {
        Self {
            id: view.id,
            title: view.title,
            location: view.location,
            price: view.price,
            bedrooms: view.bedrooms,
            description: view.description,
            image_url: view.image_url,
            contact: view.contact,
            owner: view.owner.id,
            available: view.available,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

/// Fixed-width UTC timestamps so that text order equals time order
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_uuid(idx: usize, raw: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<ListingView> {
    let owner_id = parse_uuid(8, row.get(8)?)?;
    let listing = Listing {
        id: parse_uuid(0, row.get(0)?)?,
        title: row.get(1)?,
        location: row.get(2)?,
        price: row.get(3)?,
        bedrooms: row.get(4)?,
        description: row.get(5)?,
        image_url: row.get(6)?,
        contact: row.get(7)?,
        owner: owner_id,
        available: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    };
    let owner = OwnerSummary {
        id: owner_id,
        name: row.get(12)?,
        email: row.get(13)?,
        phone: row.get(14)?,
    };
    Ok(ListingView::new(listing, owner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{NewUser, Role};
    use crate::auth::user_store::{UserStore, MIN_BCRYPT_COST};
    use crate::db;
    use crate::listings::query::{ListingFilters, ListingScope};

    fn setup() -> (ListingStore, UserStore) {
        let conn = db::in_memory().unwrap();
        (
            ListingStore::new(conn.clone()),
            UserStore::with_cost(conn, MIN_BCRYPT_COST),
        )
    }

    fn owner(users: &UserStore, email: &str) -> Uuid {
        users
            .create_user(NewUser {
                name: "Owner".to_string(),
                email: email.to_string(),
                password: "password123".to_string(),
                role: Role::Owner,
                phone: Some("555-0100".to_string()),
                location: None,
            })
            .unwrap()
            .unwrap()
            .id
    }

    fn new_listing(location: &str, price: i64, bedrooms: i64) -> NewListing {
        NewListing {
            title: format!("{} flat", location),
            location: location.to_string(),
            price,
            bedrooms,
            description: "desc".to_string(),
            image_url: "img".to_string(),
            contact: "555-0101".to_string(),
        }
    }

    fn browse(filters: ListingFilters) -> ListingQuery {
        ListingQuery::build(ListingScope::Browse, filters)
    }

    #[test]
    fn test_create_and_get_with_owner_summary() {
        let (store, users) = setup();
        let owner_id = owner(&users, "o@example.com");

        let created = store
            .create(&owner_id, new_listing("Pune", 12_000, 2))
            .unwrap();
        assert!(created.available);

        let view = store.get(&created.id).unwrap().unwrap();
        assert_eq!(view.owner.id, owner_id);
        assert_eq!(view.owner.email, "o@example.com");
        assert_eq!(view.owner.phone.as_deref(), Some("555-0100"));

        assert_eq!(store.get_listing(&created.id).unwrap().unwrap(), created);
        assert!(store.get(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_price_range_query() {
        let (store, users) = setup();
        let owner_id = owner(&users, "o@example.com");
        for price in [4000, 6000, 11000] {
            store
                .create(&owner_id, new_listing("Delhi", price, 1))
                .unwrap();
        }

        let results = store
            .find(&browse(ListingFilters {
                min_price: Some(5000),
                max_price: Some(10000),
                ..Default::default()
            }))
            .unwrap();
        let prices: Vec<i64> = results.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![6000]);
    }

    #[test]
    fn test_sql_agrees_with_in_memory_predicate() {
        let (store, users) = setup();
        let owner_id = owner(&users, "o@example.com");
        let seeds = [
            ("Koramangala, Bangalore", 20_000, 2),
            ("Whitefield, BANGALORE", 35_000, 3),
            ("Bandra, Mumbai", 60_000, 2),
            ("Salt Lake, Kolkata", 15_000, 1),
            ("100% Bangalore", 9_000, 1),
            ("São Paulo", 11_000, 2),
            ("ZÜRICH Altstadt", 70_000, 3),
        ];
        for (location, price, bedrooms) in seeds {
            store
                .create(&owner_id, new_listing(location, price, bedrooms))
                .unwrap();
        }

        let cases = [
            ListingFilters::default(),
            ListingFilters {
                location: Some("bangalore".to_string()),
                ..Default::default()
            },
            ListingFilters {
                location: Some("bangalore".to_string()),
                min_price: Some(10_000),
                ..Default::default()
            },
            ListingFilters {
                bedrooms: Some(2),
                max_price: Some(50_000),
                ..Default::default()
            },
            ListingFilters {
                location: Some("0%".to_string()),
                ..Default::default()
            },
            ListingFilters {
                location: Some("SÃO".to_string()),
                ..Default::default()
            },
            ListingFilters {
                location: Some("zürich".to_string()),
                ..Default::default()
            },
        ];

        let everything = store
            .find(&ListingQuery::build(
                ListingScope::OwnedBy(owner_id),
                ListingFilters::default(),
            ))
            .unwrap();

        for filters in cases {
            let query = browse(filters);
            let mut from_sql: Vec<Uuid> =
                store.find(&query).unwrap().into_iter().map(|l| l.id).collect();
            let mut in_memory: Vec<Uuid> = everything
                .iter()
                .cloned()
                .map(Listing::from)
                .filter(|l| query.matches(l))
                .map(|l| l.id)
                .collect();
            from_sql.sort();
            in_memory.sort();
            assert_eq!(from_sql, in_memory, "query {:?}", query);
        }
    }

    #[test]
    fn test_newest_first_and_availability() {
        let (store, users) = setup();
        let owner_id = owner(&users, "o@example.com");

        let first = store.create(&owner_id, new_listing("A", 100, 1)).unwrap();
        let second = store.create(&owner_id, new_listing("B", 100, 1)).unwrap();
        let mut third = store.create(&owner_id, new_listing("C", 100, 1)).unwrap();

        third.available = false;
        store.update(&third).unwrap();

        let browsed: Vec<Uuid> = store
            .find(&browse(ListingFilters::default()))
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(browsed, vec![second.id, first.id]);

        let mine: Vec<Uuid> = store
            .find(&ListingQuery::build(
                ListingScope::OwnedBy(owner_id),
                ListingFilters::default(),
            ))
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(mine, vec![third.id, second.id, first.id]);
    }

    #[test]
    fn test_browse_is_repeatable() {
        let (store, users) = setup();
        let owner_id = owner(&users, "o@example.com");
        for i in 1..=4 {
            store
                .create(&owner_id, new_listing("Goa", 1000 * i, 1))
                .unwrap();
        }

        let query = browse(ListingFilters::default());
        let first: Vec<Uuid> = store.find(&query).unwrap().iter().map(|l| l.id).collect();
        let second: Vec<Uuid> = store.find(&query).unwrap().iter().map(|l| l.id).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_update_keeps_owner_and_created_at() {
        let (store, users) = setup();
        let owner_id = owner(&users, "o@example.com");
        let mut listing = store.create(&owner_id, new_listing("A", 100, 1)).unwrap();

        listing.price = 250;
        listing.title = "Renovated".to_string();
        let updated_at = store.update(&listing).unwrap();

        let stored = store.get_listing(&listing.id).unwrap().unwrap();
        assert_eq!(stored.price, 250);
        assert_eq!(stored.title, "Renovated");
        assert_eq!(stored.owner, owner_id);
        assert_eq!(stored.created_at, listing.created_at);
        assert_eq!(stored.updated_at, updated_at);
    }

    #[test]
    fn test_delete_and_locations() {
        let (store, users) = setup();
        let owner_id = owner(&users, "o@example.com");
        let pune = store.create(&owner_id, new_listing("Pune", 100, 1)).unwrap();
        store.create(&owner_id, new_listing("Goa", 100, 1)).unwrap();
        store.create(&owner_id, new_listing("Goa", 200, 2)).unwrap();
        let mut hidden = store.create(&owner_id, new_listing("Agra", 100, 1)).unwrap();
        hidden.available = false;
        store.update(&hidden).unwrap();

        assert_eq!(
            store.available_locations().unwrap(),
            vec!["Goa".to_string(), "Pune".to_string()]
        );

        assert!(store.delete(&pune.id).unwrap());
        assert!(!store.delete(&pune.id).unwrap());
        assert_eq!(store.available_locations().unwrap(), vec!["Goa".to_string()]);
    }
}
