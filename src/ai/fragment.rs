use serde::de::DeserializeOwned;

use super::provider::LlmError;

/// 单个模型响应的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment<T> {
    Parsed(T),
    /// 返回了内容但不符合预期结构
    Invalid(String),
    /// 请求本身失败
    Failed(String),
}

/// JSON 解析后的取值范围校验
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// 模型常把 JSON 包在代码块或说明文字里
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

pub fn decode<T>(response: Result<String, LlmError>) -> Fragment<T>
where
    T: DeserializeOwned + Validate,
{
    let text = match response {
        Ok(text) => text,
        Err(e) => return Fragment::Failed(e.to_string()),
    };
    let Some(json) = extract_json(&text) else {
        return Fragment::Invalid("response contains no JSON object".to_string());
    };
    match serde_json::from_str::<T>(json) {
        Ok(value) => match value.validate() {
            Ok(()) => Fragment::Parsed(value),
            Err(reason) => Fragment::Invalid(reason),
        },
        Err(e) => Fragment::Invalid(format!("malformed JSON: {e}")),
    }
}
