//! Static canonicalization tables used by the normalizer.
//!
//! Keys are lowercase; lookups go through the normalizer's cleaning step
//! first. Unknown values pass through cleaned rather than being dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Region aliases: common variations to canonical names.
pub static REGION_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // France
        ("burgundy", "Bourgogne"),
        ("bordeaux", "Bordeaux"),
        ("champagne", "Champagne"),
        ("rhone", "Rhône"),
        ("rhône", "Rhône"),
        ("rhone valley", "Rhône"),
        ("loire", "Loire"),
        ("loire valley", "Loire"),
        ("alsace", "Alsace"),
        ("provence", "Provence"),
        ("languedoc", "Languedoc-Roussillon"),
        ("roussillon", "Languedoc-Roussillon"),
        ("languedoc-roussillon", "Languedoc-Roussillon"),
        ("beaujolais", "Beaujolais"),
        ("cote de nuits", "Côte de Nuits"),
        ("côte de nuits", "Côte de Nuits"),
        ("cote de beaune", "Côte de Beaune"),
        ("côte de beaune", "Côte de Beaune"),
        ("chablis", "Chablis"),
        ("sauternes", "Sauternes"),
        ("medoc", "Médoc"),
        ("médoc", "Médoc"),
        ("pauillac", "Pauillac"),
        ("margaux", "Margaux"),
        ("saint-julien", "Saint-Julien"),
        ("saint julien", "Saint-Julien"),
        ("st julien", "Saint-Julien"),
        ("saint-emilion", "Saint-Émilion"),
        ("saint emilion", "Saint-Émilion"),
        ("st emilion", "Saint-Émilion"),
        ("pomerol", "Pomerol"),
        ("graves", "Graves"),
        ("pessac-leognan", "Pessac-Léognan"),
        ("pessac leognan", "Pessac-Léognan"),
        // Italy
        ("piedmont", "Piemonte"),
        ("piemonte", "Piemonte"),
        ("tuscany", "Toscana"),
        ("toscana", "Toscana"),
        ("veneto", "Veneto"),
        ("sicily", "Sicilia"),
        ("sicilia", "Sicilia"),
        ("barolo", "Barolo"),
        ("barbaresco", "Barbaresco"),
        ("chianti", "Chianti"),
        ("chianti classico", "Chianti Classico"),
        ("brunello di montalcino", "Brunello di Montalcino"),
        ("amarone", "Amarone della Valpolicella"),
        // Spain
        ("rioja", "Rioja"),
        ("ribera del duero", "Ribera del Duero"),
        ("priorat", "Priorat"),
        ("rias baixas", "Rías Baixas"),
        ("rías baixas", "Rías Baixas"),
        ("jerez", "Jerez"),
        ("sherry", "Jerez"),
        // Germany
        ("mosel", "Mosel"),
        ("rheingau", "Rheingau"),
        ("pfalz", "Pfalz"),
        ("rheinhessen", "Rheinhessen"),
        // USA
        ("napa", "Napa Valley"),
        ("napa valley", "Napa Valley"),
        ("sonoma", "Sonoma"),
        ("sonoma county", "Sonoma"),
        ("willamette", "Willamette Valley"),
        ("willamette valley", "Willamette Valley"),
        ("santa barbara", "Santa Barbara"),
        ("paso robles", "Paso Robles"),
        ("russian river", "Russian River Valley"),
        ("russian river valley", "Russian River Valley"),
        // Australia
        ("barossa", "Barossa Valley"),
        ("barossa valley", "Barossa Valley"),
        ("mclaren vale", "McLaren Vale"),
        ("hunter valley", "Hunter Valley"),
        ("margaret river", "Margaret River"),
        ("yarra valley", "Yarra Valley"),
        ("coonawarra", "Coonawarra"),
        // New Zealand
        ("marlborough", "Marlborough"),
        ("central otago", "Central Otago"),
        ("hawkes bay", "Hawke's Bay"),
        ("hawke's bay", "Hawke's Bay"),
        // South America
        ("mendoza", "Mendoza"),
        ("maipo", "Maipo Valley"),
        ("maipo valley", "Maipo Valley"),
        ("colchagua", "Colchagua Valley"),
        ("colchagua valley", "Colchagua Valley"),
        // South Africa
        ("stellenbosch", "Stellenbosch"),
        ("franschhoek", "Franschhoek"),
        ("swartland", "Swartland"),
        // Portugal
        ("douro", "Douro"),
        ("porto", "Porto"),
        ("port", "Porto"),
        ("dao", "Dão"),
        ("dão", "Dão"),
        ("alentejo", "Alentejo"),
    ])
});

/// Grape variety aliases.
pub static GRAPE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Red grapes
        ("cab", "Cabernet Sauvignon"),
        ("cab sauv", "Cabernet Sauvignon"),
        ("cabernet", "Cabernet Sauvignon"),
        ("cabernet sauvignon", "Cabernet Sauvignon"),
        ("cab franc", "Cabernet Franc"),
        ("cabernet franc", "Cabernet Franc"),
        ("merlot", "Merlot"),
        ("pinot", "Pinot Noir"),
        ("pinot noir", "Pinot Noir"),
        ("syrah", "Syrah"),
        ("shiraz", "Shiraz"),
        ("grenache", "Grenache"),
        ("garnacha", "Grenache"),
        ("tempranillo", "Tempranillo"),
        ("tinto fino", "Tempranillo"),
        ("sangiovese", "Sangiovese"),
        ("nebbiolo", "Nebbiolo"),
        ("barbera", "Barbera"),
        ("malbec", "Malbec"),
        ("zinfandel", "Zinfandel"),
        ("zin", "Zinfandel"),
        ("primitivo", "Primitivo"),
        ("petit verdot", "Petit Verdot"),
        ("mourvèdre", "Mourvèdre"),
        ("mourvedre", "Mourvèdre"),
        ("monastrell", "Mourvèdre"),
        ("carmenere", "Carménère"),
        ("carménère", "Carménère"),
        ("gamay", "Gamay"),
        ("cinsault", "Cinsault"),
        ("carignan", "Carignan"),
        ("touriga nacional", "Touriga Nacional"),
        ("touriga franca", "Touriga Franca"),
        // White grapes
        ("chard", "Chardonnay"),
        ("chardonnay", "Chardonnay"),
        ("sauv blanc", "Sauvignon Blanc"),
        ("sauvignon", "Sauvignon Blanc"),
        ("sauvignon blanc", "Sauvignon Blanc"),
        ("riesling", "Riesling"),
        ("pinot grigio", "Pinot Grigio"),
        ("pinot gris", "Pinot Gris"),
        ("gewurztraminer", "Gewürztraminer"),
        ("gewürztraminer", "Gewürztraminer"),
        ("viognier", "Viognier"),
        ("chenin", "Chenin Blanc"),
        ("chenin blanc", "Chenin Blanc"),
        ("semillon", "Sémillon"),
        ("sémillon", "Sémillon"),
        ("muscadet", "Muscadet"),
        ("albarino", "Albariño"),
        ("albariño", "Albariño"),
        ("gruner veltliner", "Grüner Veltliner"),
        ("grüner veltliner", "Grüner Veltliner"),
        ("vermentino", "Vermentino"),
        ("trebbiano", "Trebbiano"),
        ("marsanne", "Marsanne"),
        ("roussanne", "Roussanne"),
        ("muscat", "Muscat"),
        ("moscato", "Moscato"),
        ("torrontes", "Torrontés"),
        ("torrontés", "Torrontés"),
        ("pinot meunier", "Pinot Meunier"),
        ("melon de bourgogne", "Melon de Bourgogne"),
    ])
});

/// Color normalization.
pub static COLOR_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("red", "red"),
        ("rouge", "red"),
        ("tinto", "red"),
        ("rosso", "red"),
        ("white", "white"),
        ("blanc", "white"),
        ("blanco", "white"),
        ("bianco", "white"),
        ("rosé", "rosé"),
        ("rose", "rosé"),
        ("rosado", "rosé"),
        ("pink", "rosé"),
        ("orange", "orange"),
        ("amber", "orange"),
        ("sparkling", "sparkling"),
        ("champagne", "sparkling"),
        ("cava", "sparkling"),
        ("prosecco", "sparkling"),
        ("cremant", "sparkling"),
        ("crémant", "sparkling"),
    ])
});

/// Style normalization.
pub static STYLE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("still", "still"),
        ("sparkling", "sparkling"),
        ("champagne", "sparkling"),
        ("fortified", "fortified"),
        ("port", "fortified"),
        ("porto", "fortified"),
        ("sherry", "fortified"),
        ("madeira", "fortified"),
        ("dessert", "dessert"),
        ("sweet", "dessert"),
    ])
});

/// Bottle size rules in priority order; first match wins.
pub static BOTTLE_SIZE_RULES: Lazy<Vec<(Regex, u32)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)(?:^|\s)375\s*(?:ml)?(?:\s|$)").unwrap(), 375),
        (Regex::new(r"(?i)(?:^|\s)500\s*(?:ml)?(?:\s|$)").unwrap(), 500),
        (Regex::new(r"(?i)(?:^|\s)750\s*(?:ml)?(?:\s|$)").unwrap(), 750),
        (Regex::new(r"(?i)(?:^|\s)1\.?5\s*(?:l|liter|litre)s?(?:\s|$)").unwrap(), 1500),
        (Regex::new(r"(?i)(?:^|\s)1500\s*(?:ml)?(?:\s|$)").unwrap(), 1500),
        (Regex::new(r"(?i)(?:^|\s)3\s*(?:l|liter|litre)s?(?:\s|$)").unwrap(), 3000),
        (Regex::new(r"(?i)(?:^|\s)3000\s*(?:ml)?(?:\s|$)").unwrap(), 3000),
        (Regex::new(r"(?i)magnum").unwrap(), 1500),
        (Regex::new(r"(?i)half\s*bottle").unwrap(), 375),
        (Regex::new(r"(?i)demi").unwrap(), 375),
    ]
});

/// ABV extraction patterns in priority order.
pub static ABV_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*(?:abv|alc|vol)?").unwrap(),
        Regex::new(r"(?i)(?:abv|alc|alcohol)[:\s]*(\d+(?:\.\d+)?)\s*%?").unwrap(),
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:degrees|°)").unwrap(),
    ]
});

/// Delimiters between grape names in a blend string.
pub static GRAPE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;/&]|\band\b").unwrap());

/// Four-digit year token (19xx/20xx).
pub static YEAR_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());
