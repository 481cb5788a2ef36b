/// Place names and approximate decimal-degree coordinates, `(name, lat, lng)`.
///
/// Order matters: the geocoder returns the first entry that matches.
/// Names are lower-case.
pub const PLACES: &[(&str, f64, f64)] = &[
    // UK Cities and Towns
    ("london", 51.5074, -0.1278),
    ("birmingham", 52.4862, -1.8904),
    ("manchester", 53.4808, -2.2426),
    ("liverpool", 53.4084, -2.9916),
    ("leeds", 53.8008, -1.5491),
    ("sheffield", 53.3811, -1.4701),
    ("bristol", 51.4545, -2.5879),
    ("edinburgh", 55.9533, -3.1883),
    ("glasgow", 55.8642, -4.2518),
    ("cardiff", 51.4816, -3.1791),
    ("belfast", 54.5973, -5.9301),
    ("newcastle", 54.9783, -1.6178),
    ("nottingham", 52.9548, -1.1581),
    ("leicester", 52.6369, -1.1398),
    ("coventry", 52.4068, -1.5197),
    ("bradford", 53.7960, -1.7594),
    ("hull", 53.7676, -0.3274),
    ("plymouth", 50.3755, -4.1427),
    ("stoke", 53.0027, -2.1794),
    ("wolverhampton", 52.5869, -2.1285),
    ("derby", 52.9225, -1.4746),
    ("swansea", 51.6214, -3.9436),
    ("southampton", 50.9097, -1.4044),
    ("salford", 53.4875, -2.2901),
    ("aberdeen", 57.1497, -2.0943),
    ("westminster", 51.4994, -0.1245),
    ("greenwich", 51.4769, -0.0005),
    ("canterbury", 51.2802, 1.0789),
    ("york", 53.9590, -1.0815),
    ("bath", 51.3811, -2.3590),
    ("oxford", 51.7520, -1.2577),
    ("cambridge", 52.2053, 0.1218),
    ("stratford", 52.1919, -1.7073),
    ("dover", 51.1279, 1.3134),
    ("portsmouth", 50.8198, -1.0880),
    ("brighton", 50.8225, -0.1372),
    ("bournemouth", 50.7192, -1.8808),
    ("exeter", 50.7184, -3.5339),
    ("norwich", 52.6309, 1.2974),
    ("ipswich", 52.0594, 1.1554),
    ("colchester", 51.8959, 0.9039),
    ("chelmsford", 51.7356, 0.4685),
    ("reading", 51.4543, -0.9781),
    ("luton", 51.8787, -0.4200),
    ("watford", 51.6563, -0.3963),
    ("croydon", 51.3762, -0.0982),
    ("kingston", 51.4124, -0.3004),
    ("richmond", 51.4613, -0.3037),
    ("hammersmith", 51.4920, -0.2237),
    ("chelsea", 51.4875, -0.1687),
    ("kensington", 51.5020, -0.1948),
    ("camden", 51.5390, -0.1426),
    ("islington", 51.5362, -0.1030),
    ("hackney", 51.5450, -0.0550),
    ("tower hamlets", 51.5203, -0.0293),
    ("southwark", 51.5034, -0.0896),
    ("lambeth", 51.4952, -0.1200),
    ("wandsworth", 51.4569, -0.1920),
    ("merton", 51.4014, -0.1958),
    ("sutton", 51.3614, -0.1938),
    ("bromley", 51.4060, 0.0143),
    ("lewisham", 51.4569, -0.0139),
    ("bexley", 51.4412, 0.1487),
    ("havering", 51.5774, 0.2121),
    ("redbridge", 51.5900, 0.0819),
    ("waltham forest", 51.5856, -0.0118),
    ("haringey", 51.5900, -0.1100),
    ("enfield", 51.6520, -0.0810),
    ("barnet", 51.6252, -0.1526),
    ("harrow", 51.5806, -0.3420),
    ("hillingdon", 51.5350, -0.4480),
    ("ealing", 51.5150, -0.3080),
    ("brent", 51.5580, -0.2380),
    ("hammersmith and fulham", 51.4920, -0.2237),
    ("kensington and chelsea", 51.5020, -0.1948),
    ("city of london", 51.5155, -0.0922),
    ("city of westminster", 51.4994, -0.1245),
    // European Cities and Towns
    ("paris", 48.8566, 2.3522),
    ("marseille", 43.2965, 5.3698),
    ("lyon", 45.7640, 4.8357),
    ("toulouse", 43.6047, 1.4442),
    ("nice", 43.7102, 7.2620),
    ("nantes", 47.2184, -1.5536),
    ("strasbourg", 48.5734, 7.7521),
    ("montpellier", 43.6110, 3.8767),
    ("bordeaux", 44.8378, -0.5792),
    ("lille", 50.6292, 3.0573),
    ("rennes", 48.1173, -1.6778),
    ("reims", 49.2583, 4.0317),
    ("saint-étienne", 45.4397, 4.3872),
    ("toulon", 43.1242, 5.9280),
    ("le havre", 49.4944, 0.1079),
    ("grenoble", 45.1885, 5.7245),
    ("dijon", 47.3220, 5.0415),
    ("angers", 47.4784, -0.5632),
    ("nîmes", 43.8367, 4.3601),
    ("villeurbanne", 45.7667, 4.8833),
    ("saint-denis", 48.9362, 2.3574),
    ("le mans", 48.0061, 0.1996),
    ("aix-en-provence", 43.5297, 5.4474),
    ("clermont-ferrand", 45.7772, 3.0870),
    ("brest", 48.3905, -4.4860),
    ("tours", 47.3941, 0.6848),
    ("limoges", 45.8336, 1.2611),
    ("amiens", 49.8943, 2.2958),
    ("perpignan", 42.6886, 2.8948),
    ("metz", 49.1193, 6.1757),
    ("besançon", 47.2380, 6.0240),
    ("boulogne-billancourt", 48.8350, 2.2400),
    ("orléans", 47.9029, 1.9093),
    ("mulhouse", 47.7508, 7.3359),
    ("rouen", 49.4432, 1.0993),
    ("caen", 49.1829, -0.3707),
    ("nancy", 48.6921, 6.1844),
    ("saint-pierre", 46.7811, -56.1764),
    ("argenteuil", 48.9478, 2.2474),
    ("cergy", 49.0364, 2.0769),
    ("montreuil", 48.8612, 2.4432),
    ("nanterre", 48.8922, 2.2158),
    ("vitry-sur-seine", 48.7872, 2.3931),
    ("créteil", 48.7904, 2.4556),
    ("colombes", 48.9236, 2.2522),
    ("aubervilliers", 48.9136, 2.3831),
    ("asnières-sur-seine", 48.9106, 2.2856),
    ("courbevoie", 48.8967, 2.2567),
    ("rueil-malmaison", 48.8767, 2.1897),
    ("boulogne-sur-mer", 50.7260, 1.6137),
    ("fort-de-france", 14.6037, -61.0732),
    ("saint-paul", 21.0094, -55.2708),
    ("cayenne", 4.9224, -52.3135),
    ("papeete", -17.5350, -149.5696),
    ("nouméa", -22.2758, 166.4581),
    // Americas
    ("new york", 40.7128, -74.0060),
    ("washington", 38.9072, -77.0369),
    ("boston", 42.3601, -71.0589),
    ("philadelphia", 39.9526, -75.1652),
    ("chicago", 41.8781, -87.6298),
    ("san francisco", 37.7749, -122.4194),
    ("los angeles", 34.0522, -118.2437),
    ("mexico city", 19.4326, -99.1332),
    ("havana", 23.1136, -82.3666),
    ("rio de janeiro", -22.9068, -43.1729),
    ("buenos aires", -34.6037, -58.3816),
    ("lima", -12.0464, -77.0428),
    // Asia
    ("beijing", 39.9042, 116.4074),
    ("tokyo", 35.6762, 139.6503),
    ("delhi", 28.7041, 77.1025),
    ("mumbai", 19.0760, 72.8777),
    ("shanghai", 31.2304, 121.4737),
    ("hong kong", 22.3193, 114.1694),
    ("singapore", 1.3521, 103.8198),
    ("bangkok", 13.7563, 100.5018),
    ("seoul", 37.5665, 126.9780),
    ("manila", 14.5995, 120.9842),
    ("jakarta", -6.2088, 106.8456),
    ("baghdad", 33.3152, 44.3661),
    ("tehran", 35.6892, 51.3890),
    ("jerusalem", 31.7683, 35.2137),
    ("damascus", 33.5138, 36.2765),
    ("cairo", 30.0444, 31.2357),
    // Africa
    ("cape town", -33.9249, 18.4241),
    ("johannesburg", -26.2041, 28.0473),
    ("nairobi", -1.2864, 36.8172),
    ("lagos", 6.5244, 3.3792),
    ("casablanca", 33.5731, -7.5898),
    ("algiers", 36.7538, 3.0588),
    ("tunis", 36.8065, 10.1815),
    // Oceania
    ("sydney", -33.8688, 151.2093),
    ("melbourne", -37.8136, 144.9631),
    ("auckland", -36.8485, 174.7633),
    // Countries (use capital as default)
    ("england", 51.5074, -0.1278),
    ("france", 48.8566, 2.3522),
    ("germany", 52.5200, 13.4050),
    ("italy", 41.9028, 12.4964),
    ("spain", 40.4168, -3.7038),
    ("russia", 55.7558, 37.6173),
    ("china", 39.9042, 116.4074),
    ("japan", 35.6762, 139.6503),
    ("india", 28.7041, 77.1025),
    ("usa", 38.9072, -77.0369),
    ("united states", 38.9072, -77.0369),
    ("america", 38.9072, -77.0369),
    ("canada", 45.4215, -75.6972),
    ("mexico", 19.4326, -99.1332),
    ("brazil", -15.8267, -47.9218),
    ("australia", -35.2809, 149.1300),
    ("egypt", 30.0444, 31.2357),
    ("south africa", -25.7479, 28.2293),
    // Historical regions
    ("persia", 35.6892, 51.3890),
    ("ottoman empire", 41.0082, 28.9784),
    ("holy roman empire", 48.2082, 16.3738),
    ("byzantine empire", 41.0082, 28.9784),
    ("roman empire", 41.9028, 12.4964),
    ("ancient greece", 37.9838, 23.7275),
    ("mesopotamia", 33.3152, 44.3661),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn entries_are_lower_case_unique_and_on_the_globe() {
        let mut seen = HashSet::new();
        for (name, lat, lng) in PLACES {
            assert_eq!(*name, name.to_lowercase(), "{name} must be lower-case");
            assert!(seen.insert(*name), "{name} is listed twice");
            assert!((-90.0..=90.0).contains(lat), "{name} latitude");
            assert!((-180.0..=180.0).contains(lng), "{name} longitude");
        }
    }

    #[test]
    fn capitals_carry_their_coordinates() {
        let paris = PLACES.iter().find(|(name, _, _)| *name == "paris");
        assert_eq!(paris.map(|(_, lat, lng)| (*lat, *lng)), Some((48.8566, 2.3522)));
        assert!(PLACES.iter().all(|(name, _, _)| *name != "atlantis"));
    }
}
