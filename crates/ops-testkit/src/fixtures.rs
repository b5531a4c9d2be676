//! Catalog fixtures for DB-gated scenario tests.
//!
//! The engine never migrates the OPMS catalog, so tests that need catalog
//! rows create minimal working copies here (IF NOT EXISTS, idempotent) and
//! seed them with unique ids to stay out of each other's way.

use anyhow::{Context, Result};
use sqlx::PgPool;

/// Create the minimal catalog tables the extractor, detector and webhook
/// applier touch. Safe to call from every test.
pub async fn ensure_catalog_fixtures(pool: &PgPool) -> Result<()> {
    let ddl = r#"
    create table if not exists opms_item (
        id           bigint primary key,
        product_id   bigint not null,
        code         text,
        product_type char(1) not null default 'R',
        upc          text,
        archived     char(1) not null default 'N',
        modified     timestamptz not null default now()
    );
    create table if not exists opms_product (
        id                bigint primary key,
        name              text,
        width             double precision,
        vertical_repeat   double precision,
        horizontal_repeat double precision,
        archived          char(1) not null default 'N',
        modified          timestamptz not null default now()
    );
    create table if not exists opms_vendor (
        id       bigint primary key,
        name     text not null,
        active   char(1) not null default 'Y',
        archived char(1) not null default 'N'
    );
    create table if not exists opms_product_vendor (
        product_id bigint not null,
        vendor_id  bigint not null,
        primary key (product_id, vendor_id)
    );
    create table if not exists opms_color (
        id   bigint primary key,
        name text not null
    );
    create table if not exists opms_item_color (
        item_id  bigint not null,
        color_id bigint not null,
        primary key (item_id, color_id)
    );
    create table if not exists opms_finish (
        id   bigint primary key,
        name text not null
    );
    create table if not exists opms_product_finish (
        product_id bigint not null,
        finish_id  bigint not null,
        primary key (product_id, finish_id)
    );
    create table if not exists opms_cleaning_code (
        id   bigint primary key,
        code text not null
    );
    create table if not exists opms_product_cleaning (
        product_id  bigint not null,
        cleaning_id bigint not null,
        primary key (product_id, cleaning_id)
    );
    create table if not exists opms_origin (
        id   bigint primary key,
        name text not null
    );
    create table if not exists opms_product_origin (
        product_id bigint not null,
        origin_id  bigint not null,
        primary key (product_id, origin_id)
    );
    create table if not exists opms_use (
        id   bigint primary key,
        name text not null
    );
    create table if not exists opms_product_use (
        product_id bigint not null,
        use_id     bigint not null,
        primary key (product_id, use_id)
    );
    create table if not exists opms_product_various (
        product_id  bigint primary key,
        prop_65     char(1),
        ab_2998     char(1),
        tariff_code text
    );
    create table if not exists opms_product_content (
        product_id bigint not null,
        face       char(1) not null,
        material   text not null,
        percentage double precision not null
    );
    create table if not exists opms_abrasion_test (
        product_id bigint not null,
        result     text not null,
        visible    char(1) not null default 'Y'
    );
    create table if not exists opms_firecode (
        id   bigint primary key,
        code text not null
    );
    create table if not exists opms_product_firecode (
        product_id  bigint not null,
        firecode_id bigint not null,
        visible     char(1) not null default 'Y',
        primary key (product_id, firecode_id)
    );
    "#;

    for stmt in ddl.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        sqlx::query(stmt)
            .execute(pool)
            .await
            .with_context(|| format!("fixture ddl failed: {}", &stmt[..stmt.len().min(60)]))?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SeedProduct {
    pub id: i64,
    pub name: String,
    pub width: Option<f64>,
    pub vertical_repeat: Option<f64>,
    pub horizontal_repeat: Option<f64>,
    pub prop_65: Option<String>,
    pub ab_2998: Option<String>,
}

pub async fn seed_product(pool: &PgPool, p: &SeedProduct) -> Result<()> {
    sqlx::query(
        r#"
        insert into opms_product (id, name, width, vertical_repeat, horizontal_repeat)
        values ($1, $2, $3, $4, $5)
        on conflict (id) do nothing
        "#,
    )
    .bind(p.id)
    .bind(&p.name)
    .bind(p.width)
    .bind(p.vertical_repeat)
    .bind(p.horizontal_repeat)
    .execute(pool)
    .await
    .context("seed product failed")?;

    if p.prop_65.is_some() || p.ab_2998.is_some() {
        sqlx::query(
            r#"
            insert into opms_product_various (product_id, prop_65, ab_2998)
            values ($1, $2, $3)
            on conflict (product_id) do nothing
            "#,
        )
        .bind(p.id)
        .bind(&p.prop_65)
        .bind(&p.ab_2998)
        .execute(pool)
        .await
        .context("seed product various failed")?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SeedItem {
    pub id: i64,
    pub product_id: i64,
    pub code: String,
    pub product_type: String,
}

pub async fn seed_item(pool: &PgPool, i: &SeedItem) -> Result<()> {
    sqlx::query(
        r#"
        insert into opms_item (id, product_id, code, product_type)
        values ($1, $2, $3, $4)
        on conflict (id) do nothing
        "#,
    )
    .bind(i.id)
    .bind(i.product_id)
    .bind(&i.code)
    .bind(&i.product_type)
    .execute(pool)
    .await
    .context("seed item failed")?;
    Ok(())
}

/// Attach a (possibly new) named color to an item.
pub async fn seed_color(pool: &PgPool, item_id: i64, color_id: i64, name: &str) -> Result<()> {
    sqlx::query("insert into opms_color (id, name) values ($1, $2) on conflict (id) do nothing")
        .bind(color_id)
        .bind(name)
        .execute(pool)
        .await
        .context("seed color failed")?;
    sqlx::query(
        "insert into opms_item_color (item_id, color_id) values ($1, $2) on conflict do nothing",
    )
    .bind(item_id)
    .bind(color_id)
    .execute(pool)
    .await
    .context("seed item color failed")?;
    Ok(())
}
