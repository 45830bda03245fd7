//! Listing Query Builder
//! Mission: Turn optional search filters plus the caller's scope into one
//! conjunctive predicate over listings
//!
//! The predicate is data (`Vec<Clause>`), rendered to SQL for the store and
//! evaluable in memory, so both sides agree on what a filter means.

use crate::listings::models::Listing;
use rusqlite::types::Value;
use serde::Deserialize;
use uuid::Uuid;

/// Raw query-string parameters of the listing endpoints
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQueryParams {
    pub location: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub bedrooms: Option<String>,
}

/// Parsed, optional filters
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListingFilters {
    pub location: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub bedrooms: Option<i64>,
}

impl ListingFilters {
    /// Parse query-string values. Empty values count as absent; numbers
    /// must be whole.
    pub fn from_params(params: ListingQueryParams) -> Result<Self, String> {
        Ok(Self {
            location: present(params.location),
            min_price: parse_number("minPrice", params.min_price)?,
            max_price: parse_number("maxPrice", params.max_price)?,
            bedrooms: parse_number("bedrooms", params.bedrooms)?,
        })
    }
}

/// Who is asking, and therefore which listings are in view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    /// Anyone browsing: only available listings
    Browse,
    /// An owner viewing their own listings, available or not
    OwnedBy(Uuid),
}

/// One conjunct of a listing predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Available,
    OwnedBy(Uuid),
    /// Case-insensitive literal substring
    LocationContains(String),
    PriceAtLeast(i64),
    PriceAtMost(i64),
    Bedrooms(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
}

/// Predicate plus ordering
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    clauses: Vec<Clause>,
    sort: SortOrder,
}

impl ListingQuery {
    pub fn build(scope: ListingScope, filters: ListingFilters) -> Self {
        let mut clauses = Vec::with_capacity(5);

        match scope {
            ListingScope::Browse => clauses.push(Clause::Available),
            ListingScope::OwnedBy(owner) => clauses.push(Clause::OwnedBy(owner)),
        }
        if let Some(location) = filters.location {
            clauses.push(Clause::LocationContains(location));
        }
        if let Some(min) = filters.min_price {
            clauses.push(Clause::PriceAtLeast(min));
        }
        if let Some(max) = filters.max_price {
            clauses.push(Clause::PriceAtMost(max));
        }
        if let Some(bedrooms) = filters.bedrooms {
            clauses.push(Clause::Bedrooms(bedrooms));
        }

        Self {
            clauses,
            sort: SortOrder::default(),
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    /// Render as `WHERE ... ORDER BY ...` against the listings table aliased
    /// as `l`, with positional parameters
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::with_capacity(self.clauses.len());

        for clause in &self.clauses {
            match clause {
                Clause::Available => conditions.push("l.available = 1".to_string()),
                Clause::OwnedBy(owner) => {
                    conditions.push("l.owner_id = ?".to_string());
                    params.push(Value::Text(owner.to_string()));
                }
                Clause::LocationContains(needle) => {
                    conditions.push(r"l.location_folded LIKE ? ESCAPE '\'".to_string());
                    params.push(Value::Text(format!(
                        "%{}%",
                        escape_like(&fold_case(needle))
                    )));
                }
                Clause::PriceAtLeast(min) => {
                    conditions.push("l.price >= ?".to_string());
                    params.push(Value::Integer(*min));
                }
                Clause::PriceAtMost(max) => {
                    conditions.push("l.price <= ?".to_string());
                    params.push(Value::Integer(*max));
                }
                Clause::Bedrooms(n) => {
                    conditions.push("l.bedrooms = ?".to_string());
                    params.push(Value::Integer(*n));
                }
            }
        }

        let mut sql = String::new();
        if !conditions.is_empty() {
            sql.push_str("WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        match self.sort {
            SortOrder::NewestFirst => sql.push_str(" ORDER BY l.created_at DESC, l.rowid DESC"),
        }

        (sql, params)
    }

    /// Evaluate the predicate against one listing
    pub fn matches(&self, listing: &Listing) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Available => listing.available,
            Clause::OwnedBy(owner) => listing.owner == *owner,
            Clause::LocationContains(needle) => {
                fold_case(&listing.location).contains(&fold_case(needle))
            }
            Clause::PriceAtLeast(min) => listing.price >= *min,
            Clause::PriceAtMost(max) => listing.price <= *max,
            Clause::Bedrooms(n) => listing.bedrooms == *n,
        })
    }
}

/// Case folding shared by stored locations and search needles. Full Unicode
/// lowercasing; SQLite's own `LIKE` only folds ASCII.
pub fn fold_case(raw: &str) -> String {
    raw.to_lowercase()
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number(name: &str, value: Option<String>) -> Result<Option<i64>, String> {
    present(value)
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| format!("{} must be a whole number", name))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(location: &str, price: i64, bedrooms: i64, available: bool) -> Listing {
        Listing {
            id: Uuid::new_v4(),
            title: "Flat".to_string(),
            location: location.to_string(),
            price,
            bedrooms,
            description: "desc".to_string(),
            image_url: "img".to_string(),
            contact: "contact".to_string(),
            owner: Uuid::nil(),
            available,
            created_at: "2025-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2025-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_browse_without_filters_only_restricts_availability() {
        let query = ListingQuery::build(ListingScope::Browse, ListingFilters::default());
        assert_eq!(query.clauses(), &[Clause::Available]);
        assert_eq!(query.sort(), SortOrder::NewestFirst);

        let (sql, params) = query.to_sql();
        assert_eq!(
            sql,
            "WHERE l.available = 1 ORDER BY l.created_at DESC, l.rowid DESC"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_owner_scope_drops_availability() {
        let owner = Uuid::new_v4();
        let query = ListingQuery::build(ListingScope::OwnedBy(owner), ListingFilters::default());
        assert_eq!(query.clauses(), &[Clause::OwnedBy(owner)]);

        let mut hidden = listing("Pune", 100, 1, false);
        hidden.owner = owner;
        assert!(query.matches(&hidden));

        let someone_else = listing("Pune", 100, 1, true);
        assert!(!query.matches(&someone_else));
    }

    #[test]
    fn test_all_filters_render_in_order() {
        let filters = ListingFilters {
            location: Some("pune".to_string()),
            min_price: Some(100),
            max_price: Some(900),
            bedrooms: Some(2),
        };
        let (sql, params) = ListingQuery::build(ListingScope::Browse, filters).to_sql();

        assert_eq!(
            sql,
            r"WHERE l.available = 1 AND l.location_folded LIKE ? ESCAPE '\' AND l.price >= ? AND l.price <= ? AND l.bedrooms = ? ORDER BY l.created_at DESC, l.rowid DESC"
        );
        assert_eq!(
            params,
            vec![
                Value::Text("%pune%".to_string()),
                Value::Integer(100),
                Value::Integer(900),
                Value::Integer(2),
            ]
        );
    }

    #[test]
    fn test_location_is_case_insensitive_substring() {
        let query = ListingQuery::build(
            ListingScope::Browse,
            ListingFilters {
                location: Some("BANG".to_string()),
                ..Default::default()
            },
        );
        assert!(query.matches(&listing("Koramangala, Bangalore", 1, 1, true)));
        assert!(!query.matches(&listing("Mumbai", 1, 1, true)));
    }

    #[test]
    fn test_location_folds_non_ascii_case() {
        let query = ListingQuery::build(
            ListingScope::Browse,
            ListingFilters {
                location: Some("SÃO".to_string()),
                ..Default::default()
            },
        );
        assert!(query.matches(&listing("São Paulo", 1, 1, true)));
        assert!(!query.matches(&listing("Sao Paulo", 1, 1, true)));

        let (_, params) = query.to_sql();
        assert_eq!(params, vec![Value::Text("%são%".to_string())]);
    }

    #[test]
    fn test_like_metacharacters_are_literal() {
        assert_eq!(escape_like("50%_off\\"), r"50\%\_off\\");

        let query = ListingQuery::build(
            ListingScope::Browse,
            ListingFilters {
                location: Some("a%".to_string()),
                ..Default::default()
            },
        );
        assert!(!query.matches(&listing("abc", 1, 1, true)));
        assert!(query.matches(&listing("a%b", 1, 1, true)));
    }

    #[test]
    fn test_predicate_is_conjunction_of_filters() {
        let listings = vec![
            listing("X town", 50, 1, true),
            listing("X town", 150, 2, true),
            listing("Y city", 150, 2, true),
            listing("X town", 500, 3, false),
        ];
        let location_only = ListingQuery::build(
            ListingScope::Browse,
            ListingFilters {
                location: Some("x".to_string()),
                ..Default::default()
            },
        );
        let price_only = ListingQuery::build(
            ListingScope::Browse,
            ListingFilters {
                min_price: Some(100),
                ..Default::default()
            },
        );
        let both = ListingQuery::build(
            ListingScope::Browse,
            ListingFilters {
                location: Some("x".to_string()),
                min_price: Some(100),
                ..Default::default()
            },
        );

        for l in &listings {
            assert_eq!(
                both.matches(l),
                location_only.matches(l) && price_only.matches(l)
            );
        }
        let hits: Vec<i64> = listings
            .iter()
            .filter(|l| both.matches(l))
            .map(|l| l.price)
            .collect();
        assert_eq!(hits, vec![150]);
    }

    #[test]
    fn test_price_range_bounds_are_inclusive() {
        let query = ListingQuery::build(
            ListingScope::Browse,
            ListingFilters {
                min_price: Some(5000),
                max_price: Some(10000),
                ..Default::default()
            },
        );
        let prices = [4000, 5000, 6000, 10000, 11000];
        let hits: Vec<i64> = prices
            .iter()
            .filter(|&&p| query.matches(&listing("a", p, 1, true)))
            .copied()
            .collect();
        assert_eq!(hits, vec![5000, 6000, 10000]);
    }

    #[test]
    fn test_filters_from_params() {
        let filters = ListingFilters::from_params(ListingQueryParams {
            location: Some("  ".to_string()),
            min_price: Some("5000".to_string()),
            max_price: Some("".to_string()),
            bedrooms: Some(" 2 ".to_string()),
        })
        .unwrap();

        assert_eq!(
            filters,
            ListingFilters {
                location: None,
                min_price: Some(5000),
                max_price: None,
                bedrooms: Some(2),
            }
        );
    }

    #[test]
    fn test_filters_reject_malformed_numbers() {
        let err = ListingFilters::from_params(ListingQueryParams {
            max_price: Some("lots".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, "maxPrice must be a whole number");

        assert!(ListingFilters::from_params(ListingQueryParams {
            bedrooms: Some("2.5".to_string()),
            ..Default::default()
        })
        .is_err());
    }
}
