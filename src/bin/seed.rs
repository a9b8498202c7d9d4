use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use awe_store_api::{
    config::AppConfig,
    db::{OrmConn, create_orm_conn, run_migrations},
    entity::{
        customers::{ActiveModel as CustomerActive, Column as CustomerCol, Entity as Customers},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    },
    models::{ImageList, SpecMap},
};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id =
        ensure_customer(&orm, "admin", "admin@awe.example", "Store Admin", "admin123", "admin")
            .await?;
    let customer_id = ensure_customer(
        &orm,
        "alice",
        "alice@awe.example",
        "Alice Cooper",
        "alice123",
        "customer",
    )
    .await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, Customer ID: {customer_id}");
    Ok(())
}

async fn ensure_customer(
    orm: &OrmConn,
    username: &str,
    email: &str,
    full_name: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Customers::find()
        .filter(CustomerCol::Username.eq(username))
        .one(orm)
        .await?
    {
        println!("Customer {username} already exists");
        return Ok(existing.id);
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let customer = CustomerActive {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        full_name: Set(full_name.to_string()),
        phone: Set(None),
        address: Set(None),
        password_hash: Set(password_hash),
        role: Set(role.to_string()),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(orm)
    .await?;

    println!("Seeded customer {username} (role={role})");
    Ok(customer.id)
}

async fn seed_products(orm: &OrmConn) -> anyhow::Result<()> {
    let products: Vec<(&str, &str, Decimal, &str, &str, i32)> = vec![
        (
            "UltraBook Pro 14",
            "Slim 14-inch laptop with 16GB RAM and 512GB SSD",
            Decimal::new(129999, 2),
            "Laptops",
            "AWE",
            25,
        ),
        (
            "Photon X5 Smartphone",
            "6.1-inch OLED smartphone with 128GB storage",
            Decimal::new(79999, 2),
            "Phones",
            "AWE",
            60,
        ),
        (
            "SoundCore Wireless Earbuds",
            "Noise-cancelling earbuds with 24h battery",
            Decimal::new(8999, 2),
            "Audio",
            "SoundCore",
            150,
        ),
        (
            "Volt 65W USB-C Charger",
            "Compact GaN fast charger",
            Decimal::new(2999, 2),
            "Accessories",
            "Volt",
            300,
        ),
    ];

    for (name, description, price, category, brand, stock) in products {
        let exists = Products::find()
            .filter(ProdCol::Name.eq(name))
            .one(orm)
            .await?;
        if exists.is_some() {
            continue;
        }

        ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(description.to_string()),
            price: Set(price),
            category: Set(category.to_string()),
            brand: Set(Some(brand.to_string())),
            model: Set(None),
            specifications: Set(SpecMap::default()),
            images: Set(ImageList::default()),
            stock_quantity: Set(stock),
            is_available: Set(true),
            views_count: Set(0),
            sales_count: Set(0),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
