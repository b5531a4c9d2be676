//! The master join and its auxiliary queries.
//!
//! One query produces the fully-populated row for a syncable item; four
//! aggregations fill in content, abrasion and firecode text; a fifth
//! fetches origin names for description composition. When the master join
//! comes back empty, a diagnostic follow-up explains why in terms the
//! operator can act on.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::debug;

use ops_db::VendorMapper;

use crate::describe::{clean_abrasion, purchase_description, sales_description, DescriptionParts};
use crate::{ExtractError, ExtractedItem, ExtractedPricing, NotSyncableReason};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Pricing extraction is off by default: the ERP owns price.
    pub include_pricing: bool,
}

// ---------------------------------------------------------------------------
// Master join
// ---------------------------------------------------------------------------

const MASTER_JOIN: &str = r#"
select
  i.id                 as item_id,
  i.code               as code,
  i.product_type       as product_type,
  i.upc                as upc,
  p.id                 as product_id,
  p.name               as product_name,
  p.width              as width,
  p.vertical_repeat    as vertical_repeat,
  p.horizontal_repeat  as horizontal_repeat,
  v.id                 as vendor_id,
  m.erp_vendor_id      as erp_vendor_id,
  (select array_agg(c.name order by c.name)
     from opms_item_color ic
     join opms_color c on c.id = ic.color_id
    where ic.item_id = i.id)                             as color_names,
  (select string_agg(f.name, ', ' order by f.name)
     from opms_product_finish pf
     join opms_finish f on f.id = pf.finish_id
    where pf.product_id = p.id)                          as finish,
  (select string_agg(cc.code, ', ' order by cc.code)
     from opms_product_cleaning pc
     join opms_cleaning_code cc on cc.id = pc.cleaning_id
    where pc.product_id = p.id)                          as cleaning,
  (select string_agg(u.name, ', ' order by u.name)
     from opms_product_use pu
     join opms_use u on u.id = pu.use_id
    where pu.product_id = p.id)                          as application,
  pv.prop_65           as prop_65,
  pv.ab_2998           as ab_2998,
  pv.tariff_code       as tariff_code
from opms_item i
join opms_product p
  on p.id = i.product_id
 and p.archived = 'N'
left join opms_product_vendor link
  on link.product_id = p.id
left join opms_vendor v
  on v.id = link.vendor_id
 and v.active = 'Y'
 and v.archived = 'N'
left join opms_netsuite_vendor_mapping m
  on m.opms_vendor_id = v.id
 and m.opms_name = m.erp_name
left join opms_product_various pv
  on pv.product_id = p.id
where i.id = $1
  and i.archived = 'N'
  and coalesce(i.code, '') <> ''
  and exists (select 1 from opms_item_color ic where ic.item_id = i.id)
"#;

/// Extract one fully-populated row for an item.
///
/// The vendor id resolved by the master join is cross-checked through the
/// mapper (which applies its own TTL cache); the join's name-equality
/// filter and the mapper agree by construction.
pub async fn extract(
    pool: &PgPool,
    mapper: &VendorMapper,
    item_id: i64,
    opts: ExtractOptions,
) -> Result<ExtractedItem, ExtractError> {
    let row = sqlx::query(MASTER_JOIN)
        .bind(item_id)
        .fetch_optional(pool)
        .await
        .context("master join failed")?;

    let Some(row) = row else {
        return match diagnose_unsyncable(pool, item_id).await? {
            Some(reason) => Err(ExtractError::NotSyncable(reason)),
            None => Err(ExtractError::NoRow { item_id }),
        };
    };

    let code: String = row.try_get("code").context("read code")?;
    let product_id: i64 = row.try_get("product_id").context("read product_id")?;
    let product_type: String = row.try_get("product_type").context("read product_type")?;
    let color_names: Option<Vec<String>> = row.try_get("color_names").context("read colors")?;

    let opms_vendor_id: Option<i64> = row.try_get("vendor_id").context("read vendor_id")?;
    let erp_vendor_id: Option<i64> = match opms_vendor_id {
        Some(vid) => mapper.erp_id_for(pool, vid).await,
        None => None,
    };

    // Auxiliary aggregations: failures here mean a missing value, not a
    // failed extraction.
    let front_content = content_text(pool, product_id, 'F').await?;
    let back_content = content_text(pool, product_id, 'B').await?;
    let abrasion = abrasion_text(pool, product_id).await?.and_then(|t| clean_abrasion(&t));
    let firecodes = firecode_text(pool, product_id).await?;
    let origin = origin_text(pool, product_id).await?;

    let pricing = if opts.include_pricing {
        Some(pricing_row(pool, product_id, &product_type).await?)
    } else {
        None
    };

    let mut item = ExtractedItem {
        item_id,
        product_id,
        code,
        product_type,
        upc: row.try_get("upc").context("read upc")?,
        product_name: row.try_get("product_name").context("read product_name")?,
        width: row.try_get("width").context("read width")?,
        vertical_repeat: row.try_get("vertical_repeat").context("read vertical_repeat")?,
        horizontal_repeat: row
            .try_get("horizontal_repeat")
            .context("read horizontal_repeat")?,
        color_names: color_names.unwrap_or_default(),
        opms_vendor_id,
        erp_vendor_id,
        finish: row.try_get("finish").context("read finish")?,
        cleaning: row.try_get("cleaning").context("read cleaning")?,
        origin,
        application: row.try_get("application").context("read application")?,
        prop_65: row.try_get("prop_65").context("read prop_65")?,
        ab_2998: row.try_get("ab_2998").context("read ab_2998")?,
        tariff_code: row.try_get("tariff_code").context("read tariff_code")?,
        front_content,
        back_content,
        abrasion,
        firecodes,
        pricing,
        purchase_description: String::new(),
        sales_description: String::new(),
    };

    let parts = DescriptionParts {
        item_code: &item.code,
        product_name: item.product_name.as_deref(),
        color_names: &item.color_names,
        width: item.width,
        vertical_repeat: item.vertical_repeat,
        horizontal_repeat: item.horizontal_repeat,
        front_content: item.front_content.as_deref(),
        back_content: item.back_content.as_deref(),
        abrasion: item.abrasion.as_deref(),
        firecodes: item.firecodes.as_deref(),
        origin: item.origin.as_deref(),
    };
    item.purchase_description = purchase_description(&parts);
    item.sales_description = sales_description(&parts);

    debug!(item_id, code = %item.code, "extracted item");
    Ok(item)
}

// ---------------------------------------------------------------------------
// Auxiliary aggregations
// ---------------------------------------------------------------------------

/// Canonical content text for one face, e.g. "60% Cotton, 40% Linen".
async fn content_text(pool: &PgPool, product_id: i64, face: char) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        r#"
        select string_agg(
                 trim(to_char(percentage, 'FM999')) || '% ' || material,
                 ', ' order by percentage desc, material)
        from opms_product_content
        where product_id = $1 and face = $2
        "#,
    )
    .bind(product_id)
    .bind(face.to_string())
    .fetch_optional(pool)
    .await
    .context("content aggregation failed")?;
    Ok(row.and_then(|(s,)| s))
}

/// Visible abrasion test results, raw (placeholder cleaning happens after).
async fn abrasion_text(pool: &PgPool, product_id: i64) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        r#"
        select string_agg(result, ', ' order by result)
        from opms_abrasion_test
        where product_id = $1 and visible = 'Y'
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("abrasion aggregation failed")?;
    Ok(row.and_then(|(s,)| s))
}

/// Visible firecodes.
async fn firecode_text(pool: &PgPool, product_id: i64) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        r#"
        select string_agg(fc.code, ', ' order by fc.code)
        from opms_product_firecode pf
        join opms_firecode fc on fc.id = pf.firecode_id
        where pf.product_id = $1 and pf.visible = 'Y'
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("firecode aggregation failed")?;
    Ok(row.and_then(|(s,)| s))
}

/// Origin country names, used by description composition and the payload.
async fn origin_text(pool: &PgPool, product_id: i64) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        r#"
        select string_agg(o.name, ', ' order by o.name)
        from opms_product_origin po
        join opms_origin o on o.id = po.origin_id
        where po.product_id = $1
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("origin aggregation failed")?;
    Ok(row.and_then(|(s,)| s))
}

async fn pricing_row(pool: &PgPool, product_id: i64, product_type: &str) -> Result<ExtractedPricing> {
    let price = sqlx::query(
        r#"
        select cut_price, roll_price
        from opms_price
        where product_id = $1 and product_type = $2
        "#,
    )
    .bind(product_id)
    .bind(product_type)
    .fetch_optional(pool)
    .await
    .context("price query failed")?;

    let cost = sqlx::query(
        r#"
        select cut_cost, roll_cost
        from opms_cost
        where product_id = $1
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("cost query failed")?;

    let mut out = ExtractedPricing::default();
    if let Some(row) = price {
        out.customer_cut = row.try_get("cut_price")?;
        out.customer_roll = row.try_get("roll_price")?;
    }
    if let Some(row) = cost {
        out.vendor_cut = row.try_get("cut_cost")?;
        out.vendor_roll = row.try_get("roll_cost")?;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Explain an empty master join. Checks run in severity order; the first
/// conclusive reason wins. `None` means the item looks syncable from here
/// (or does not exist yet) — the caller treats that as transient.
pub async fn diagnose_unsyncable(
    pool: &PgPool,
    item_id: i64,
) -> Result<Option<NotSyncableReason>> {
    let row = sqlx::query(
        r#"
        select
          i.code                          as code,
          i.archived                      as item_archived,
          i.product_type                  as product_type,
          p.archived                      as product_archived,
          exists (select 1 from opms_item_color ic where ic.item_id = i.id) as has_colors
        from opms_item i
        left join opms_product p on p.id = i.product_id
        where i.id = $1
        "#,
    )
    .bind(item_id)
    .fetch_optional(pool)
    .await
    .context("diagnostic query failed")?;

    let Some(row) = row else {
        // Item not present at all — possibly a replication lag artifact.
        return Ok(None);
    };

    let code: Option<String> = row.try_get("code")?;
    let item_archived: String = row.try_get("item_archived")?;
    let product_type: String = row.try_get("product_type")?;
    let product_archived: Option<String> = row.try_get("product_archived")?;
    let has_colors: bool = row.try_get("has_colors")?;

    if product_type == "D" {
        return Ok(Some(NotSyncableReason::DigitalItem));
    }
    if code.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Ok(Some(NotSyncableReason::MissingCode));
    }
    if item_archived == "Y" {
        return Ok(Some(NotSyncableReason::ItemArchived));
    }
    if product_archived.as_deref() == Some("Y") {
        return Ok(Some(NotSyncableReason::ProductArchived));
    }
    if !has_colors {
        return Ok(Some(NotSyncableReason::NoColors));
    }
    Ok(None)
}
