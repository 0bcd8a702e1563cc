//! スクレイプ結果のCSV永続化

use std::path::Path;

use tracing::info;

use crate::error::ScraperError;
use crate::listing::types::ProductRecord;

const CSV_HEADER: [&str; 6] = ["Name", "Price", "Link", "Tag", "Images", "Colors"];

/// 商品レコードをCSVへ書き出す
///
/// 出力先は毎回上書き（追記ではない）。`colors` は
/// `"name: image, name: image"` 形式へ平坦化する。
pub fn write_csv(path: &Path, records: &[ProductRecord]) -> Result<(), ScraperError> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(CSV_HEADER)?;

    for record in records {
        writer.write_record([
            record.name.as_str(),
            record.price.as_str(),
            record.link.as_str(),
            record.tag.as_str(),
            record.images.as_str(),
            record.flattened_colors().as_str(),
        ])?;
    }

    writer.flush()?;
    info!("Saved {} records to {:?}", records.len(), path);

    Ok(())
}
