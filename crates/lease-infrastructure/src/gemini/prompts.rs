//! Prompt text for each document task.

pub const CONTRACT_FINGERPRINT: &str = "Analyze the attached rental agreement. Extract the following details and return them as a single-line, pipe-separated string. Do NOT add any explanation, conversational text, or markdown formatting. The required format is exactly: Landlord: [Full Name] | Tenant: [Full Name] | Unit: [Unit Number and Full Address] | From: [Start Date DD/MM/YYYY] | To: [End Date DD/MM/YYYY] | Rent: [Monthly Rent as a number]";

pub const AUTHENTICITY: &str = "Act as a forensic document analyst. Analyze the attached image for signs of digital manipulation, photoshopping, or being a photo of a screen (e.g., moire patterns, screen glare). Look for inconsistent lighting, pixelation, and unnatural text. Provide a confidence score as a percentage of how authentic the document appears. Respond with ONLY the number. For example: 98.5";

pub const TITLE_DEED: &str = r#"Analyze the attached Thai property title deed (Chanote). Extract the full name of the current owner and the full property address. Respond with ONLY a valid JSON object with keys "ownerName" and "propertyAddress". For example: {"ownerName": "Somchai Jaidee", "propertyAddress": "123 Sukhumvit Road, Khlong Toei, Bangkok 10110"}"#;

pub const UTILITY_BILL: &str = r#"Analyze the attached utility bill (e.g., electricity, water, internet bill). Extract the full name and the full service address listed on the bill. Respond with ONLY a valid JSON object with keys "nameOnBill" and "addressOnBill"."#;

pub fn compare_addresses(a: &str, b: &str) -> String {
    format!(
        "You are an address validation expert for Thailand. Address A is: \"{}\". Address B is: \"{}\". Do these two addresses refer to the same physical property, even with minor typos or formatting differences? Respond with only the word \"true\" or \"false\".",
        a, b
    )
}

/// `labels` is rendered as a JSON array so quoting inside labels survives.
pub fn best_unit_match(query: &str, labels: &[&str]) -> String {
    let list = serde_json::to_string(labels).unwrap_or_else(|_| "[]".to_string());
    format!(
        "I have text from a rental contract: \"{}\". I also have a list of official unit numbers: {}. Which single unit number from the list is the most likely match for the text? Consider typos and extra words. Respond with ONLY the best-matching unit number from the list. If no confident match, respond with \"none\".",
        query, list
    )
}
