//! Prompt catalogue for listing descriptions, category suggestion and
//! product page extraction, in Polish and English.

use serde_json::Value;
use tracing::warn;

use crate::models::Language;

struct Wording {
    subject: &'static str,
    focus: &'static str,
    tone: &'static str,
}

pub struct Category {
    pub id: &'static str,
    with_size: bool,
    en: Wording,
    pl: Wording,
}

macro_rules! category {
    ($id:literal, $with_size:literal,
     en: ($en_subject:literal, $en_focus:literal, $en_tone:literal),
     pl: ($pl_subject:literal, $pl_focus:literal, $pl_tone:literal)) => {
        Category {
            id: $id,
            with_size: $with_size,
            en: Wording { subject: $en_subject, focus: $en_focus, tone: $en_tone },
            pl: Wording { subject: $pl_subject, focus: $pl_focus, tone: $pl_tone },
        }
    };
}

pub const CATEGORIES: &[Category] = &[
    category!("womens_fashion", true,
        en: ("a women's fashion item", "material, fit, style, brand reputation, condition details, care instructions", "Casual, friendly tone. SEO-friendly."),
        pl: ("damskiej odzieży", "materiał, krój, styl, marka, stan, pielęgnacja", "Swobodny, przyjazny ton. SEO.")),
    category!("mens_fashion", true,
        en: ("a men's fashion item", "material, fit, style, brand, condition, care instructions", "Casual, friendly tone. SEO-friendly."),
        pl: ("męskiej odzieży", "materiał, krój, styl, marka, stan, pielęgnacja", "Swobodny, przyjazny ton. SEO.")),
    category!("kids_clothing", true,
        en: ("kids' clothing", "material, comfort, size and age range, condition, safety, brand", "Warm, friendly tone. Mention safety."),
        pl: ("odzieży dziecięcej", "materiał, wygoda, rozmiar i wiek, stan, bezpieczeństwo, marka", "Ciepły, przyjazny ton. Wspomnij o bezpieczeństwie.")),
    category!("shoes", true,
        en: ("shoes", "brand, size, sole and upper wear, style, comfort features", "Casual tone. Include exact measurements."),
        pl: ("obuwia", "marka, rozmiar, zużycie podeszwy i cholewki, styl, wygoda", "Swobodny ton. Podaj dokładne wymiary.")),
    category!("bags_accessories", false,
        en: ("a bag or accessory", "brand, material, dimensions, condition, pockets and compartments, style", "Descriptive, friendly tone."),
        pl: ("torebki lub akcesorium", "marka, materiał, wymiary, stan, kieszenie i przegródki, styl", "Opisowy, przyjazny ton.")),
    category!("jewelry_watches", false,
        en: ("jewelry or a watch", "material, brand, condition, features, style, authenticity markers", "Elegant, precise tone."),
        pl: ("biżuterii lub zegarka", "materiał, marka, stan, cechy, styl, oznaczenia autentyczności", "Elegancki, precyzyjny ton.")),
    category!("electronics", false,
        en: ("electronics", "specifications, features, condition, included accessories, purchase date", "Clear, technical tone. Use search keywords."),
        pl: ("elektroniki", "specyfikacja, funkcje, stan, akcesoria w zestawie, data zakupu", "Jasny, techniczny ton. Użyj słów kluczowych.")),
    category!("home_garden", false,
        en: ("a home and garden item", "functionality, materials, condition, usage, benefits", "Practical tone. Emphasize features."),
        pl: ("przedmiotu do domu i ogrodu", "funkcjonalność, materiały, stan, sposób użycia, korzyści", "Praktyczny ton. Podkreśl zalety.")),
    category!("sports_hobby", true,
        en: ("a sports or hobby item", "type, brand, condition, level of use, specifications, performance", "Enthusiastic tone. Sport-specific keywords."),
        pl: ("sprzętu sportowego lub hobbystycznego", "typ, marka, stan, stopień użytkowania, specyfikacja, wydajność", "Entuzjastyczny ton. Słowa kluczowe z danej dyscypliny.")),
    category!("toys_games", false,
        en: ("a toy or game", "age range, educational value, safety, condition, completeness", "Warm, clear tone. Mention safety."),
        pl: ("zabawki lub gry", "wiek, wartość edukacyjna, bezpieczeństwo, stan, kompletność", "Ciepły, jasny ton. Wspomnij o bezpieczeństwie.")),
    category!("books_media", false,
        en: ("a book or media item", "title, author, edition, condition, language, format", "Informative tone. Be specific about condition."),
        pl: ("książki lub multimediów", "tytuł, autor, wydanie, stan, język, format", "Informacyjny ton. Dokładnie opisz stan.")),
    category!("beauty_health", false,
        en: ("a beauty or health product", "brand, product type, usage, expiry date, quantity left, benefits", "Clean, honest tone. Include safety information."),
        pl: ("produktu kosmetycznego lub zdrowotnego", "marka, typ produktu, użycie, data ważności, pozostała ilość, korzyści", "Czysty, uczciwy ton. Informacje o bezpieczeństwie.")),
    category!("vehicles_parts", false,
        en: ("a vehicle or part", "make and model compatibility, condition, specifications, installation", "Technical, precise tone."),
        pl: ("pojazdu lub części", "kompatybilność z marką i modelem, stan, specyfikacja, montaż", "Techniczny, precyzyjny ton.")),
    category!("animals_pet_supplies", false,
        en: ("pet supplies", "type, suitability, safety, condition, size or capacity", "Caring, informative tone."),
        pl: ("akcesoriów dla zwierząt", "typ, przeznaczenie, bezpieczeństwo, stan, rozmiar lub pojemność", "Troskliwy, informacyjny ton.")),
    category!("music_instruments", false,
        en: ("a musical instrument", "type, brand, condition, specifications, included accessories, sound quality", "Passionate, technical tone."),
        pl: ("instrumentu muzycznego", "typ, marka, stan, specyfikacja, akcesoria, jakość dźwięku", "Pasjonujący, techniczny ton.")),
    category!("collectibles_art", false,
        en: ("a collectible or artwork", "rarity, condition, provenance, materials, dimensions, authenticity", "Elegant, detailed tone."),
        pl: ("przedmiotu kolekcjonerskiego lub dzieła sztuki", "rzadkość, stan, pochodzenie, materiały, wymiary, autentyczność", "Elegancki, szczegółowy ton.")),
    category!("other", false,
        en: ("an item", "key features, condition, quality, brand, value", "Clear, engaging tone. Use search keywords."),
        pl: ("przedmiotu", "kluczowe cechy, stan, jakość, marka, wartość", "Jasny, angażujący ton. Użyj słów kluczowych.")),
];

pub fn category_ids() -> impl Iterator<Item = &'static str> {
    CATEGORIES.iter().map(|c| c.id)
}

pub fn find_category(id: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.id == id)
}

/// Inputs for a description prompt. Empty strings count as absent.
#[derive(Debug, Default, Clone)]
pub struct PromptFields<'a> {
    pub brand: Option<&'a str>,
    pub condition: Option<&'a str>,
    pub size: Option<&'a str>,
    pub details: Option<&'a str>,
    pub page_context: Option<&'a str>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn description_prompt(category: &Category, fields: &PromptFields<'_>, language: Language) -> String {
    let brand = present(fields.brand).unwrap_or("unknown");
    let condition = present(fields.condition).unwrap_or("good");
    let size = present(fields.size).unwrap_or_default();

    let mut prompt = match language {
        Language::Pl => {
            let w = &category.pl;
            let mut p = format!(
                "Wygeneruj angażujący opis ogłoszenia dla {}.\n\nMarka: {}\nStan: {}\n",
                w.subject, brand, condition
            );
            if category.with_size {
                p.push_str(&format!("Rozmiar: {}\n", size));
            }
            p.push_str(&format!("\nSkup się na: {}.\n{} Max 200 słów.", w.focus, w.tone));
            p
        }
        Language::En => {
            let w = &category.en;
            let mut p = format!(
                "Generate an engaging marketplace listing description for {}.\n\nBrand: {}\nCondition: {}\n",
                w.subject, brand, condition
            );
            if category.with_size {
                p.push_str(&format!("Size: {}\n", size));
            }
            p.push_str(&format!("\nFocus on: {}.\n{} Max 200 words.", w.focus, w.tone));
            p
        }
    };

    if let Some(details) = present(fields.details) {
        let label = match language {
            Language::Pl => "Dodatkowe szczegóły:",
            Language::En => "Additional details:",
        };
        prompt.push_str(&format!("\n\n{} {}", label, details));
    }

    if let Some(context) = present(fields.page_context) {
        let label = match language {
            Language::Pl => "Informacje ze strony produktu (użyj ich, aby wzbogacić opis):",
            Language::En => "Information from the product page (use it to enrich the description):",
        };
        prompt.push_str(&format!("\n\n{}\n{}", label, context));
    }

    prompt
}

pub fn category_prompt(language: Language) -> String {
    let categories = category_ids().collect::<Vec<_>>().join(", ");
    match language {
        Language::Pl => format!(
            "Przeanalizuj zdjęcia i określ kategorię przedmiotu.\n\nDostępne kategorie: {}\n\nOdpowiedz TYLKO nazwą kategorii (jednym słowem), bez dodatkowych wyjaśnień.",
            categories
        ),
        Language::En => format!(
            "Analyze the images and determine the item category.\n\nAvailable categories: {}\n\nRespond with ONLY the category name (one word), without any additional explanation.",
            categories
        ),
    }
}

/// First word of a model answer if it names a known category, else `other`.
pub fn parse_category(answer: &str) -> &'static str {
    let first = answer.split_whitespace().next().unwrap_or_default().to_lowercase();
    let cleaned: String = first
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    find_category(&cleaned).map(|c| c.id).unwrap_or("other")
}

pub fn extraction_prompt(page_text: &str, language: Language) -> String {
    let categories = category_ids().collect::<Vec<_>>().join(", ");
    match language {
        Language::Pl => format!(
            "Przeanalizuj treść strony produktu i wyodrębnij informacje w formacie JSON.\n\n\
             Treść strony:\n{page_text}\n\n\
             Wyodrębnij (jeśli dostępne):\n\
             - title: nazwa produktu\n\
             - brand: marka\n\
             - description: krótki opis produktu, max 200 słów\n\
             - price: cena (tylko liczba)\n\
             - currency: waluta (PLN, EUR, USD itd.)\n\
             - category: jedna z: {categories}\n\
             - condition: stan (new, like_new, good, fair, poor)\n\
             - size: rozmiar\n\
             - specifications: kluczowe parametry jako obiekt\n\n\
             Odpowiedz TYLKO poprawnym JSON-em, bez dodatkowych wyjaśnień."
        ),
        Language::En => format!(
            "Analyze the product page content and extract information as JSON.\n\n\
             Page content:\n{page_text}\n\n\
             Extract (if available):\n\
             - title: product name\n\
             - brand: brand name\n\
             - description: brief product description, max 200 words\n\
             - price: price (number only)\n\
             - currency: currency code (PLN, EUR, USD, etc.)\n\
             - category: one of: {categories}\n\
             - condition: condition (new, like_new, good, fair, poor)\n\
             - size: size\n\
             - specifications: key specifications as an object\n\n\
             Respond with ONLY valid JSON, no additional explanation."
        ),
    }
}

/// Parses a JSON object from a model answer, tolerating markdown code fences.
/// Malformed answers yield an empty object.
pub fn parse_json_answer(answer: &str) -> serde_json::Map<String, Value> {
    let mut body = answer.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // Drop the fence line (which may carry a language tag) and the closing fence.
        let rest = rest.split_once('\n').map(|(_, tail)| tail).unwrap_or_default();
        body = rest.split("\n```").next().unwrap_or(rest).trim();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!("Model answer was not a JSON object, ignoring it");
            serde_json::Map::new()
        }
    }
}
