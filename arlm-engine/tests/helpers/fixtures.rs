//! Catalog fixtures in the backend's wire format

use serde_json::{json, Value};

pub const OPERNHAUS_ID: &str = "7506e475-2e94-4e46-a0b3-06fe6d9cc6ab";
pub const NEAR_ID: &str = "2f1d7a40-0c7e-4d8e-9a55-5b8c1a0f0001";
pub const FAR_ID: &str = "2f1d7a40-0c7e-4d8e-9a55-5b8c1a0f0002";

/// Zurich main station
pub const ORIGIN_LAT: f64 = 47.3769;
pub const ORIGIN_LON: f64 = 8.5417;

/// Meters per degree of latitude on the haversine sphere
pub const METERS_PER_DEGREE_LAT: f64 = 111_194.93;

pub fn lat_north_of_origin(meters: f64) -> f64 {
    ORIGIN_LAT + meters / METERS_PER_DEGREE_LAT
}

pub fn category_json(id: &str, name: &str, sort_order: i32) -> Value {
    json!({
        "id": id,
        "name": name,
        "name_en": null,
        "icon": "🏛️",
        "color": "#3B82F6",
        "sort_order": sort_order,
        "created_at": "2026-01-10T09:00:00Z"
    })
}

pub fn landmark_json(id: &str, name: &str, lat: f64, lon: f64, category_id: Option<&str>) -> Value {
    json!({
        "id": id,
        "name": name,
        "name_en": null,
        "description": format!("{name} description"),
        "description_en": null,
        "latitude": lat,
        "longitude": lon,
        "altitude": 408.0,
        "category_id": category_id,
        "image_url": null,
        "zurich_tourism_id": null,
        "is_active": true,
        "created_at": "2026-01-10T09:00:00Z",
        "updated_at": "2026-01-12T09:00:00Z",
        "street_address": null,
        "postal_code": "8001",
        "city": "Zürich",
        "phone": null,
        "email": null,
        "website_url": null,
        "opening_hours": "Mo-Fr 10:00-18:00;Sa 10:00-16:00",
        "api_source": null,
        "last_synced_at": null,
        "category": category_id.map(|id| category_json(id, "Kultur", 1))
    })
}

pub fn body(records: &[Value]) -> String {
    Value::Array(records.to_vec()).to_string()
}

/// Opernhaus plus one landmark 200 m and one 900 m north of the origin
pub fn standard_landmarks() -> Vec<Value> {
    vec![
        landmark_json(OPERNHAUS_ID, "Opernhaus Zürich", 47.3650, 8.5467, Some("culture")),
        landmark_json(NEAR_ID, "Bahnhofplatz", lat_north_of_origin(200.0), ORIGIN_LON, Some("squares")),
        landmark_json(FAR_ID, "Landesmuseum", lat_north_of_origin(900.0), ORIGIN_LON, Some("culture")),
    ]
}

pub fn standard_landmarks_body() -> String {
    body(&standard_landmarks())
}

pub fn standard_categories_body() -> String {
    body(&[category_json("squares", "Plätze", 2), category_json("culture", "Kultur", 1)])
}

pub fn photos_body(landmark_id: &str) -> String {
    body(&[
        json!({
            "id": "photo-1",
            "landmark_id": landmark_id,
            "photo_url": "https://cdn.example/1.jpg",
            "caption": "Fassade",
            "caption_en": "Facade",
            "sort_order": 0,
            "is_primary": true,
            "created_at": "2026-01-10T09:00:00Z",
            "updated_at": "2026-01-10T09:00:00Z"
        }),
        json!({
            "id": "photo-2",
            "landmark_id": landmark_id,
            "photo_url": "https://cdn.example/2.jpg",
            "caption": null,
            "caption_en": null,
            "sort_order": 1,
            "is_primary": false,
            "created_at": "2026-01-10T09:00:00Z",
            "updated_at": "2026-01-10T09:00:00Z"
        }),
    ])
}
