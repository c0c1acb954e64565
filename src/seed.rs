//! Demo catalogue loaded at startup when `SEED_DEMO_DATA` is set.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::domain::aggregates::product::{Brand, Discount, Fit, Price, Rating, SizeStock, Specifications, Variant, VariantImage};
use crate::domain::aggregates::{Category, NewProduct, Occasion, Product, Role, User};
use crate::domain::value_objects::Email;
use crate::recommend::embed_product;
use crate::store::{Store, StoreError};

pub const DEMO_ADMIN_EMAIL: &str = "admin@manvue.com";

struct Demo {
    title: &'static str,
    description: &'static str,
    category: Category,
    occasion: Occasion,
    brand: &'static str,
    original: i64,
    selling: i64,
    colors: &'static [(&'static str, &'static str, &'static str)],
    material: &'static str,
    fit: Fit,
    tags: &'static [&'static str],
    rating: f32,
    sold: u64,
    featured: bool,
    best_seller: bool,
}

const IMAGE_BASE: &str = "https://images.unsplash.com";

const CATALOGUE: &[Demo] = &[
    Demo {
        title: "Classic White Oxford Shirt",
        description: "A timeless white oxford shirt for formal and casual occasions in premium cotton with a regular fit.",
        category: Category::Shirts, occasion: Occasion::Formal, brand: "Manvue Essentials", original: 2499, selling: 1999,
        colors: &[("White", "#FFFFFF", "photo-1596755094514-f87e34085b2c"), ("Light Blue", "#ADD8E6", "photo-1598033129183-c4f50c736f10")],
        material: "100% Cotton", fit: Fit::Regular, tags: &["formal", "office", "classic", "cotton"],
        rating: 4.5, sold: 89, featured: true, best_seller: true,
    },
    Demo {
        title: "Blue Linen Casual Shirt",
        description: "Breathable linen shirt in a washed blue for weekends and warm evenings.",
        category: Category::Shirts, occasion: Occasion::Casual, brand: "Manvue Essentials", original: 2999, selling: 2299,
        colors: &[("Blue", "#1E40AF", "photo-1602810318383-e386cc2a3ccf"), ("Navy Blue", "#000080", "photo-1603252109303-2751441dd157")],
        material: "100% Linen", fit: Fit::Relaxed, tags: &["casual", "linen", "summer", "shirt"],
        rating: 4.3, sold: 54, featured: false, best_seller: false,
    },
    Demo {
        title: "Slim Fit Dark Blue Jeans",
        description: "Stretch denim jeans in a dark indigo wash with a modern slim fit for everyday wear.",
        category: Category::Jeans, occasion: Occasion::Casual, brand: "Manvue Denim", original: 3999, selling: 2999,
        colors: &[("Dark Blue", "#00008B", "photo-1542272604-787c3835535d")],
        material: "98% Cotton, 2% Elastane", fit: Fit::Slim, tags: &["casual", "denim", "stretch", "everyday"],
        rating: 4.2, sold: 156, featured: false, best_seller: true,
    },
    Demo {
        title: "Premium Black Leather Jacket",
        description: "Genuine leather biker jacket with an asymmetric zip and quilted lining.",
        category: Category::Jackets, occasion: Occasion::Casual, brand: "Manvue Leather", original: 12999, selling: 9999,
        colors: &[("Black", "#000000", "photo-1551028719-00167b16eac5"), ("Brown", "#8B4513", "photo-1520975954732-35dd22299614")],
        material: "Genuine Leather", fit: Fit::Regular, tags: &["jacket", "leather", "biker", "premium"],
        rating: 4.7, sold: 34, featured: true, best_seller: false,
    },
    Demo {
        title: "Cotton Casual T-Shirt",
        description: "Soft crew-neck cotton tee, a wardrobe basic for layering or wearing on its own.",
        category: Category::Tshirts, occasion: Occasion::Casual, brand: "Manvue Basics", original: 899, selling: 699,
        colors: &[("Navy Blue", "#000080", "photo-1521572163474-6864f9cf17ab"), ("Grey", "#808080", "photo-1583743814966-8936f5b7be1a")],
        material: "100% Cotton", fit: Fit::Regular, tags: &["tshirt", "casual", "cotton", "basic"],
        rating: 4.1, sold: 234, featured: false, best_seller: true,
    },
    Demo {
        title: "Formal Black Leather Shoes",
        description: "Polished oxford shoes in black calf leather with a cushioned insole.",
        category: Category::FormalShoes, occasion: Occasion::Formal, brand: "Manvue Footwear", original: 4999, selling: 3999,
        colors: &[("Black", "#000000", "photo-1614252235316-8c857d38b5f4")],
        material: "Leather", fit: Fit::Regular, tags: &["shoes", "formal", "leather", "office"],
        rating: 4.4, sold: 67, featured: true, best_seller: false,
    },
    Demo {
        title: "Navy Wool Blazer",
        description: "Tailored two-button blazer in a fine wool blend, sharp enough for weddings and the office.",
        category: Category::Blazers, occasion: Occasion::Wedding, brand: "Manvue Tailoring", original: 8999, selling: 7499,
        colors: &[("Navy Blue", "#000080", "photo-1507679799987-c73779587ccf")],
        material: "Wool Blend", fit: Fit::Slim, tags: &["blazer", "formal", "wedding", "wool"],
        rating: 4.6, sold: 41, featured: true, best_seller: false,
    },
];

/// Prices in the demo list are in pence.
fn pounds(pence: i64) -> Decimal { Decimal::new(pence, 2) }

fn build(demo: &Demo, admin: Uuid) -> Result<Product, crate::domain::aggregates::ProductError> {
    let variants = demo
        .colors
        .iter()
        .map(|(color, code, photo)| Variant {
            color: (*color).into(),
            color_code: (*code).into(),
            images: vec![VariantImage { url: format!("{IMAGE_BASE}/{photo}?w=400&h=400&fit=crop"), alt: format!("{color} {}", demo.title), is_primary: true }],
            sizes: ["S", "M", "L", "XL"].iter().map(|s| SizeStock { size: (*s).into(), stock: 15, price: Decimal::ZERO }).collect(),
        })
        .collect();
    let original = pounds(demo.original);
    let selling = pounds(demo.selling);
    let input = NewProduct {
        title: demo.title.into(),
        slug: None,
        description: demo.description.into(),
        short_description: None,
        category: demo.category,
        sub_category: Some(demo.occasion),
        brand: Brand { name: demo.brand.into(), logo: String::new() },
        price: Price { original, selling, currency: "GBP".into() },
        discount: Discount { percentage: ((original - selling) * Decimal::ONE_HUNDRED / original).round(), is_active: true, valid_until: None },
        variants,
        specifications: Specifications { material: demo.material.into(), fit: demo.fit, ..Specifications::default() },
        tags: demo.tags.iter().map(|t| (*t).to_string()).collect(),
        features: vec![],
        glb_model_url: String::new(),
        is_featured: demo.featured,
        is_new_arrival: true,
        is_best_seller: demo.best_seller,
    };
    let mut product = Product::create(input, admin)?;
    product.rating = Rating { average: demo.rating, count: (demo.sold / 2) as u32 };
    product.sold_count = demo.sold;
    product.embeddings = embed_product(&product);
    Ok(product)
}

/// Every demo product, owned by `admin`.
pub fn demo_products(admin: Uuid) -> Vec<Product> {
    CATALOGUE.iter().filter_map(|demo| build(demo, admin).ok()).collect()
}

/// Load the admin account and demo catalogue into an empty store.
/// Returns the number of products inserted.
pub async fn seed_demo_data(store: &dyn Store, admin_password: Option<&str>) -> Result<usize, StoreError> {
    if store.counts().await?.products > 0 {
        tracing::info!("Catalogue already populated, skipping demo seed");
        return Ok(0);
    }
    let admin = match store.find_user_by_email(DEMO_ADMIN_EMAIL).await? {
        Some(existing) => existing.id,
        None => match admin_password.map(hash_password) {
            Some(Ok(hash)) => {
                let email = Email::parse(DEMO_ADMIN_EMAIL).map_err(|_| StoreError::NotFound("admin email"))?;
                let mut user = User::register("Admin User", &email, hash);
                user.role = Role::Admin;
                user.is_email_verified = true;
                store.insert_user(&user).await?;
                tracing::info!(email = DEMO_ADMIN_EMAIL, "Created demo admin account");
                user.id
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Demo admin password rejected, seeding without an admin account");
                Uuid::nil()
            }
            None => Uuid::nil(),
        },
    };
    let products = demo_products(admin);
    for product in &products { store.insert_product(product).await?; }
    tracing::info!(count = products.len(), "Seeded demo catalogue");
    Ok(products.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_demo_products_are_valid() {
        let products = demo_products(Uuid::nil());
        assert_eq!(products.len(), CATALOGUE.len());
        assert!(products.iter().all(|p| p.embeddings.len() == crate::recommend::EMBEDDING_DIMS));
        assert!(products.iter().all(|p| p.inventory.total_stock > 0));
        let oxford = &products[0];
        assert_eq!(oxford.price.selling, Decimal::new(1999, 2));
        assert_eq!(oxford.price_for("White", "M"), Decimal::new(1999, 2));
        assert_eq!(oxford.discount.percentage, Decimal::new(20, 0));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();
        assert_eq!(seed_demo_data(&store, Some("Admin123!")).await.unwrap(), CATALOGUE.len());
        assert_eq!(seed_demo_data(&store, Some("Admin123!")).await.unwrap(), 0);
        let admin = store.find_user_by_email(DEMO_ADMIN_EMAIL).await.unwrap().unwrap();
        assert!(admin.is_admin());
    }
}
