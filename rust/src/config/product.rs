//! Discovery of product specific configuration overlays.
//!
//! A product `Fedora` with the variant `Workstation` is configured by
//! `product.d/fedora.conf` and optionally `product.d/fedora-workstation.conf`.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use camino::{Utf8Path, Utf8PathBuf};

/// Directory with product overlays, relative to the configuration directory.
pub const PRODUCT_DIR: &str = "product.d";

/// Normalize a product or variant name into a file name component:
/// lowercase ASCII alphanumerics, with runs of anything else collapsed
/// into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut r = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !r.is_empty() {
                r.push('-');
            }
            pending_sep = false;
            r.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    r
}

/// Overlay files for a product, in merge order. Returns `None` when the
/// product has no overlay; the variant overlay is optional.
pub fn find_product_overlays(
    config_dir: &Utf8Path,
    product: &str,
    variant: Option<&str>,
) -> Option<Vec<Utf8PathBuf>> {
    let product = slugify(product);
    if product.is_empty() {
        return None;
    }
    let dir = config_dir.join(PRODUCT_DIR);
    let product_path = dir.join(format!("{product}.conf"));
    if !product_path.is_file() {
        tracing::debug!("No product configuration at {product_path}");
        return None;
    }
    let mut r = vec![product_path];
    let variant = variant.map(slugify).filter(|v| !v.is_empty());
    if let Some(variant) = variant {
        let variant_path = dir.join(format!("{product}-{variant}.conf"));
        if variant_path.is_file() {
            r.push(variant_path);
        } else {
            tracing::debug!("No variant configuration at {variant_path}");
        }
    }
    Some(r)
}
