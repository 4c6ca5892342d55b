//! Listing page parsing shared by both marketplaces: schema.org `Product`
//! JSON-LD first, OpenGraph meta tags as a fallback.

use scraper::{Html, Selector};
use serde_json::Value;

use super::ScrapedListing;
use super::price::{PriceParser, detect_currency};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct DetailParser {
    json_ld: Selector,
    meta: Selector,
    price_label: Selector,
    prices: PriceParser,
}

impl DetailParser {
    pub fn new(prices: PriceParser) -> Result<Self> {
        Ok(Self {
            json_ld: selector(r#"script[type="application/ld+json"]"#)?,
            meta: selector("meta[property], meta[name]")?,
            price_label: selector(r#"[data-testid="ad-price-container"], [data-testid="item-price"]"#)?,
            prices,
        })
    }

    pub fn parse(&self, html: &str) -> ScrapedListing {
        let document = Html::parse_document(html);
        let mut listing = ScrapedListing::default();

        if let Some(product) = self.find_product(&document) {
            apply_product(&mut listing, &product);
        }

        for meta in document.select(&self.meta) {
            let element = meta.value();
            let key = element.attr("property").or_else(|| element.attr("name")).unwrap_or_default();
            let Some(content) = element.attr("content").map(str::trim).filter(|c| !c.is_empty()) else {
                continue;
            };

            match key {
                "og:title" if listing.title.is_none() => listing.title = Some(content.to_string()),
                "og:description" | "description" if listing.description.is_none() => {
                    listing.description = Some(content.to_string())
                }
                "og:image" if !listing.images.iter().any(|i| i == content) => {
                    listing.images.push(content.to_string())
                }
                "product:price:amount" | "og:price:amount" if listing.price.is_none() => {
                    listing.price = self.prices.parse_positive(content)
                }
                "product:price:currency" | "og:price:currency" if listing.currency.is_none() => {
                    listing.currency = Some(content.to_uppercase())
                }
                "product:brand" if listing.brand.is_none() => listing.brand = Some(content.to_string()),
                _ => {}
            }
        }

        if listing.price.is_none() {
            if let Some(label) = document.select(&self.price_label).next() {
                let text = label.text().collect::<String>();
                listing.price = self.prices.parse_positive(&text);
                if listing.currency.is_none() {
                    listing.currency = detect_currency(&text).map(str::to_string);
                }
            }
        }

        listing
    }

    fn find_product(&self, document: &Html) -> Option<Value> {
        document
            .select(&self.json_ld)
            .filter_map(|script| serde_json::from_str::<Value>(&script.inner_html()).ok())
            .find_map(|value| product_node(&value).cloned())
    }
}

pub(crate) fn selector(css: &'static str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::Parse {
        message: format!("Invalid selector '{}': {:?}", css, e),
    })
}

fn product_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(product_node),
        Value::Object(map) => {
            let is_product = match map.get("@type") {
                Some(Value::String(t)) => t == "Product",
                Some(Value::Array(types)) => types.iter().any(|t| t == "Product"),
                _ => false,
            };
            if is_product {
                Some(value)
            } else {
                map.get("@graph").and_then(product_node)
            }
        }
        _ => None,
    }
}

fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => map.get("name").and_then(text_field),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn apply_product(listing: &mut ScrapedListing, product: &Value) {
    listing.title = product.get("name").and_then(text_field);
    listing.description = product.get("description").and_then(text_field);
    listing.brand = product.get("brand").and_then(text_field);
    listing.size = product.get("size").and_then(text_field);
    listing.category = product.get("category").and_then(text_field);
    listing.condition = product
        .get("itemCondition")
        .and_then(text_field)
        .map(|c| c.rsplit('/').next().unwrap_or_default().to_string());

    match product.get("image") {
        Some(Value::Array(images)) => {
            listing.images = images.iter().filter_map(text_field).collect();
        }
        Some(image) => listing.images.extend(text_field(image)),
        None => {}
    }

    let offer = match product.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        other => other,
    };
    if let Some(offer) = offer {
        listing.price = match offer.get("price") {
            Some(Value::Number(n)) => n.as_f64().filter(|p| *p > 0.0),
            Some(Value::String(s)) => s.trim().replace(',', ".").parse::<f64>().ok().filter(|p| *p > 0.0),
            _ => None,
        };
        listing.currency = offer.get("priceCurrency").and_then(text_field);
    }

    let views = product
        .get("interactionStatistic")
        .and_then(|stat| stat.get("userInteractionCount"))
        .and_then(|count| count.as_i64().or_else(|| count.as_str()?.parse().ok()));
    listing.views = views;
}
