//! Published trading strategy catalog served by `/api/strategies`

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: u32,
    pub name: &'static str,
    pub profit: &'static str,
    pub win_rate: &'static str,
    pub profit_factor: &'static str,
    pub rr_ratio: &'static str,
    pub description: &'static str,
}

pub fn catalog() -> Vec<Strategy> {
    vec![
        Strategy {
            id: 1,
            name: "XAUUSD Scalping",
            profit: "+15% annual",
            win_rate: "72%",
            profit_factor: "1.8",
            rr_ratio: "2.1",
            description: "Gold scalping strategy based on candlestick patterns on the 5-minute timeframe.",
        },
        Strategy {
            id: 2,
            name: "WTI Breakout",
            profit: "+22% annual",
            win_rate: "65%",
            profit_factor: "2.1",
            rr_ratio: "2.8",
            description: "Crude oil breakout strategy with volume confirmation and session analysis.",
        },
    ]
}
