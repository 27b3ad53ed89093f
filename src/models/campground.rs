//! Campground model and its form types.

use serde::{Deserialize, Serialize};

use super::{AuthorRef, ReviewDetail};

/// GeoJSON geometry produced by the geocoder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    /// Coordinates are `[longitude, latitude]`.
    Point { coordinates: [f64; 2] },
}

impl Geometry {
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Geometry::Point {
            coordinates: [longitude, latitude],
        }
    }

    pub fn longitude(&self) -> f64 {
        match self {
            Geometry::Point { coordinates } => coordinates[0],
        }
    }

    pub fn latitude(&self) -> f64 {
        match self {
            Geometry::Point { coordinates } => coordinates[1],
        }
    }
}

/// A stored image: where to fetch it and the media-store id used to delete it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    pub url: String,
    pub filename: String,
}

/// A campground listing as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campground {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub location: String,
    pub geometry: Geometry,
    pub images: Vec<ImageRef>,
    /// Id of the creating user; immutable after creation
    pub author: String,
    /// Review ids in insertion order
    pub reviews: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Validated, user-editable campground fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CampgroundInput {
    pub title: String,
    pub price: f64,
    pub description: String,
    pub location: String,
}

/// Raw campground fields as submitted, kept as text for re-rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampgroundForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
}

impl CampgroundForm {
    /// Pre-fill an edit form from the stored campground.
    pub fn from_campground(campground: &Campground) -> Self {
        Self {
            title: campground.title.clone(),
            price: campground.price.to_string(),
            description: campground.description.clone(),
            location: campground.location.clone(),
        }
    }

    /// Assign a multipart text field by name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        match name {
            "title" | "campground[title]" => self.title = value,
            "price" | "campground[price]" => self.price = value,
            "description" | "campground[description]" => self.description = value,
            "location" | "campground[location]" => self.location = value,
            _ => {}
        }
    }

    pub fn validate(&self) -> Result<CampgroundInput, String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("Title is required".to_string());
        }
        let location = self.location.trim();
        if location.is_empty() {
            return Err("Location is required".to_string());
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err("Description is required".to_string());
        }
        let price = match self.price.trim().parse::<f64>() {
            Ok(price) if price.is_finite() && price >= 0.0 => price,
            _ => return Err("Price must be a non-negative number".to_string()),
        };

        Ok(CampgroundInput {
            title: title.to_string(),
            price,
            description: description.to_string(),
            location: location.to_string(),
        })
    }
}

/// A fully enriched campground ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCampground {
    pub input: CampgroundInput,
    pub geometry: Geometry,
    pub images: Vec<ImageRef>,
    pub author: String,
}

/// Deep read of a campground: author and reviews resolved for display.
#[derive(Debug, Clone, Serialize)]
pub struct CampgroundDetail {
    pub campground: Campground,
    pub author: AuthorRef,
    pub reviews: Vec<ReviewDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn form(title: &str, price: &str, description: &str, location: &str) -> CampgroundForm {
        CampgroundForm {
            title: title.to_string(),
            price: price.to_string(),
            description: description.to_string(),
            location: location.to_string(),
        }
    }

    #[test]
    fn test_validate_trims_and_parses() {
        let input = form(" Pine Hollow ", "12.5", "Quiet spot", " Boulder, Colorado ")
            .validate()
            .unwrap();
        assert_eq!(input.title, "Pine Hollow");
        assert_eq!(input.price, 12.5);
        assert_eq!(input.location, "Boulder, Colorado");
    }

    #[rstest]
    #[case("", "10", "desc", "Boulder")]
    #[case("Title", "", "desc", "Boulder")]
    #[case("Title", "-1", "desc", "Boulder")]
    #[case("Title", "NaN", "desc", "Boulder")]
    #[case("Title", "ten", "desc", "Boulder")]
    #[case("Title", "10", "", "Boulder")]
    #[case("Title", "10", "desc", "  ")]
    fn test_validate_rejects(
        #[case] title: &str,
        #[case] price: &str,
        #[case] description: &str,
        #[case] location: &str,
    ) {
        assert!(form(title, price, description, location).validate().is_err());
    }

    #[test]
    fn test_set_field_accepts_nested_names() {
        let mut form = CampgroundForm::default();
        form.set_field("campground[title]", "Nested".to_string());
        form.set_field("price", "3".to_string());
        form.set_field("image", "ignored".to_string());
        assert_eq!(form.title, "Nested");
        assert_eq!(form.price, "3");
    }

    #[test]
    fn test_geometry_is_geojson() {
        let json = serde_json::to_value(Geometry::point(-105.27, 40.01)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "Point", "coordinates": [-105.27, 40.01] })
        );
    }
}
