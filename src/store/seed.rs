use crate::geo::Coordinate;
use crate::models::{Category, Location};

/// 卡保山谷（Vale do Capão）的初始地点
pub fn locations() -> Vec<Location> {
    let mut locations = vec![
        Location::new(
            "loc-001",
            "Mirante do Vale",
            "Panoramic view over the Capão valley, best at sunset.",
            Coordinate::new(-14.0642, -41.3025),
            50,
            50.0,
            Category::Viewpoint,
        ),
        Location::new(
            "loc-002",
            "Cachoeira da Fumaça",
            "One of the tallest waterfalls in Brazil, dropping 340 meters.",
            Coordinate::new(-14.0891, -41.2875),
            100,
            60.0,
            Category::Nature,
        ),
        Location::new(
            "loc-003",
            "Cachoeirão",
            "Waterfall with a large natural pool, perfect for a swim.",
            Coordinate::new(-14.0701, -41.3142),
            75,
            50.0,
            Category::Nature,
        ),
        Location::new(
            "loc-004",
            "Rodas",
            "A chain of crystal-clear pools carved into the rock.",
            Coordinate::new(-14.0534, -41.2987),
            60,
            40.0,
            Category::Nature,
        ),
        Location::new(
            "loc-005",
            "Riachinho",
            "Easy trail along a stream with small waterfalls.",
            Coordinate::new(-14.0589, -41.3156),
            40,
            40.0,
            Category::Hidden,
        ),
        Location::new(
            "loc-006",
            "Praça do Capão",
            "Village square and weekend crafts market.",
            Coordinate::new(-14.0612, -41.3068),
            80,
            100.0,
            Category::Market,
        ),
    ];
    locations[5].address = Some("Praça Principal, Vale do Capão, Palmeiras - BA".to_string());
    locations
}
