/// Output formatting: terminal table and JSON.
use houserank_core::RankedItem;
use serde::Serialize;

use crate::store::{House, RankingScope};

#[derive(Serialize)]
struct JsonRankedHouse<'a> {
    rank: usize,
    #[serde(flatten)]
    house: &'a House,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    collection: &'a str,
    ranking: &'a str,
    ranked: Vec<JsonRankedHouse<'a>>,
    unranked: Vec<&'a House>,
}

/// Render a ranking as a terminal table, followed by the houses still waiting to be ranked.
pub fn render_table(scope: &RankingScope, ranked: &[RankedItem<House>], unranked: &[House]) -> String {
    // Widest title for padding, in chars since that is what `{:<w$}` pads by
    let title_width = ranked
        .iter()
        .map(|r| r.payload.title.chars().count())
        .chain(unranked.iter().map(|h| h.title.chars().count()))
        .max()
        .unwrap_or(5)
        .max(5); // at least "House"

    let mut out = format!("{scope}\n\n");
    out.push_str(&format!("  # | {:<title_width$} | Id\n", "House"));
    out.push_str(&format!("----|-{}-|---------\n", "-".repeat(title_width)));

    for item in ranked {
        let rank = item.rank.map_or_else(|| "?".to_string(), |r| (r + 1).to_string());
        out.push_str(&format!(
            "{:>3} | {:<title_width$} | {}\n",
            rank,
            item.payload.title,
            short_id(&item.id),
        ));
    }
    for house in unranked {
        out.push_str(&format!("{:>3} | {:<title_width$} | {}\n", "-", house.title, short_id(&house.id)));
    }

    out.push_str(&format!("\n{} ranked, {} waiting to be ranked\n", ranked.len(), unranked.len()));
    out
}

/// Render a ranking as pretty JSON.
pub fn render_json(scope: &RankingScope, ranked: &[RankedItem<House>], unranked: &[House]) -> serde_json::Result<String> {
    let output = JsonOutput {
        collection: &scope.collection_name,
        ranking: &scope.ranking_name,
        ranked: ranked
            .iter()
            .enumerate()
            .map(|(i, r)| JsonRankedHouse {
                rank: r.rank.unwrap_or(i) + 1,
                house: &r.payload,
            })
            .collect(),
        unranked: unranked.iter().collect(),
    };

    serde_json::to_string_pretty(&output)
}

/// First 8 characters of an id, enough to type back as a prefix.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
