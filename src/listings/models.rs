//! Listing Models
//! Mission: Rental listings, their input bodies, and the rules they obey

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_IMAGE_URL: &str = "https://via.placeholder.com/200";

/// A stored rental listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub price: i64,
    pub bedrooms: i64,
    pub description: String,
    pub image_url: String,
    pub contact: String,
    pub owner: Uuid,
    pub available: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Public contact details of a listing's owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Listing as returned to clients, owner expanded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub price: i64,
    pub bedrooms: i64,
    pub description: String,
    pub image_url: String,
    pub contact: String,
    pub owner: OwnerSummary,
    pub available: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ListingView {
    pub fn new(listing: Listing, owner: OwnerSummary) -> Self {
        Self {
            id: listing.id,
            title: listing.title,
            location: listing.location,
            price: listing.price,
            bedrooms: listing.bedrooms,
            description: listing.description,
            image_url: listing.image_url,
            contact: listing.contact,
            owner,
            available: listing.available,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
        }
    }
}

/// Validated fields for a new listing
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub title: String,
    pub location: String,
    pub price: i64,
    pub bedrooms: i64,
    pub description: String,
    pub image_url: String,
    pub contact: String,
}

/// Create body. Required fields are optional here so that a missing field
/// is reported as a validation error rather than a JSON rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub title: Option<String>,
    pub location: Option<String>,
    pub price: Option<i64>,
    pub bedrooms: Option<i64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub contact: Option<String>,
}

impl CreateListingRequest {
    pub fn validate(self) -> Result<NewListing, String> {
        let title = non_blank(self.title);
        let location = non_blank(self.location);
        let description = non_blank(self.description);
        let contact = non_blank(self.contact);

        let (
            Some(title),
            Some(location),
            Some(price),
            Some(bedrooms),
            Some(description),
            Some(contact),
        ) = (
            title,
            location,
            self.price,
            self.bedrooms,
            description,
            contact,
        )
        else {
            return Err("Please provide all required fields".to_string());
        };

        check_price(price)?;
        check_bedrooms(bedrooms)?;

        Ok(NewListing {
            title,
            location,
            price,
            bedrooms,
            description,
            image_url: non_blank(self.image_url).unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            contact,
        })
    }
}

/// Update body. Absent fields keep their stored value; the owner can never
/// be changed through an update.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub location: Option<String>,
    pub price: Option<i64>,
    pub bedrooms: Option<i64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub contact: Option<String>,
    pub available: Option<bool>,
}

impl UpdateListingRequest {
    /// Apply the supplied fields to `listing`, re-checking every invariant
    pub fn apply_to(self, listing: &mut Listing) -> Result<(), String> {
        if let Some(title) = self.title {
            listing.title = required_text("title", title)?;
        }
        if let Some(location) = self.location {
            listing.location = required_text("location", location)?;
        }
        if let Some(price) = self.price {
            check_price(price)?;
            listing.price = price;
        }
        if let Some(bedrooms) = self.bedrooms {
            check_bedrooms(bedrooms)?;
            listing.bedrooms = bedrooms;
        }
        if let Some(description) = self.description {
            listing.description = required_text("description", description)?;
        }
        if let Some(image_url) = self.image_url {
            listing.image_url =
                non_blank(Some(image_url)).unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string());
        }
        if let Some(contact) = self.contact {
            listing.contact = required_text("contact", contact)?;
        }
        if let Some(available) = self.available {
            listing.available = available;
        }
        Ok(())
    }
}

fn check_price(price: i64) -> Result<(), String> {
    if price <= 0 {
        return Err("Price must be greater than 0".to_string());
    }
    Ok(())
}

fn check_bedrooms(bedrooms: i64) -> Result<(), String> {
    if bedrooms < 1 {
        return Err("Bedrooms must be at least 1".to_string());
    }
    Ok(())
}

fn required_text(field: &str, value: String) -> Result<String, String> {
    non_blank(Some(value)).ok_or_else(|| format!("{} cannot be empty", field))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
