//! 商品リスト関連の型定義

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 未解決フィールドのプレースホルダー
///
/// 欠損ではなく値として扱い、CSVにもそのまま出力される。
pub const NA: &str = "N/A";

/// カラーバリエーション
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVariant {
    #[serde(rename = "colorName")]
    pub color_name: String,
    #[serde(rename = "colorImage")]
    pub color_image: String,
}

/// 商品レコード
///
/// `images` は抽出時点で ", " 連結済みの1文字列（colorsと異なり構造を持たない）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub price: String,
    pub link: String,
    pub tag: String,
    pub images: String,
    pub colors: Vec<ColorVariant>,
}

impl ProductRecord {
    /// CSV出力用にcolorsを `"name: image, name: image"` 形式へ平坦化
    pub fn flattened_colors(&self) -> String {
        self.colors
            .iter()
            .map(|c| format!("{}: {}", c.color_name, c.color_image))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// ページ内抽出スクリプトの戻り値
///
/// `list` か `error` のどちらか一方のみが入る。
#[derive(Debug, Deserialize)]
pub struct ExtractOutcome {
    #[serde(default)]
    pub list: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 生のJSON項目列をProductRecordへ正規化
///
/// 名前が解決できない項目（"N/A"）は除外する。その他のフィールドは
/// 未解決時プレースホルダー "N/A" を入れる。`images` のみ空文字版
/// （画像ゼロ件は "" であって "N/A" ではない）。
pub fn parse_products(raw: &[Value]) -> Vec<ProductRecord> {
    raw.iter()
        .filter_map(|item| {
            let obj = item.as_object()?;

            let name = str_field(obj, "name");
            if name == NA {
                return None;
            }

            let colors = obj
                .get("colors")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .map(|c| ColorVariant {
                            color_name: c
                                .get("colorName")
                                .and_then(|v| v.as_str())
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .unwrap_or(NA)
                                .to_string(),
                            color_image: c
                                .get("colorImage")
                                .and_then(|v| v.as_str())
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .unwrap_or(NA)
                                .to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            Some(ProductRecord {
                name,
                price: str_field(obj, "price"),
                link: str_field(obj, "link"),
                tag: str_field(obj, "tag"),
                images: obj
                    .get("images")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                colors,
            })
        })
        .collect()
}

fn str_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NA)
        .to_string()
}
