/// 情緒分析端點
pub mod sentiment;
