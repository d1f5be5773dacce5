// =====================================================================================
// File: core-utils/src/fixtures.rs
// Description: Synthetic test data generators for SentinelDLP platform
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

//! Synthetic sensitive-data generators used across the detection, policy, and
//! pipeline test suites. No real data ever appears in tests: card numbers are
//! constructed against the Luhn checksum, identifiers follow the documented
//! shapes, and secrets are random hex.

use fake::Fake;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Synthetic sensitive-data generator
pub struct SyntheticPii;

impl SyntheticPii {
    /// Calculate the Luhn check digit for a partial card number
    pub fn luhn_check_digit(partial: &str) -> u32 {
        let digits: Vec<u32> = partial.chars().filter_map(|c| c.to_digit(10)).collect();
        let mut checksum = 0u32;
        // Walking right-to-left over the partial number, every first digit is
        // doubled because the check digit will occupy the final position.
        for (i, digit) in digits.iter().rev().enumerate() {
            if i % 2 == 0 {
                let doubled = digit * 2;
                checksum += if doubled > 9 { doubled - 9 } else { doubled };
            } else {
                checksum += digit;
            }
        }
        (10 - (checksum % 10)) % 10
    }

    /// Generate Luhn-valid card numbers across the common network prefixes
    pub fn credit_cards(count: usize) -> Vec<String> {
        let prefixes = ["4", "51", "6011", "34", "37"];
        (0..count)
            .map(|i| {
                let prefix = prefixes[i % prefixes.len()];
                let mut partial = prefix.to_string();
                partial.push_str(&"0".repeat(15 - prefix.len()));
                let check = Self::luhn_check_digit(&partial);
                format!("{}{}", partial, check)
            })
            .collect()
    }

    /// Generate card-shaped numbers that fail the Luhn checksum
    pub fn invalid_credit_cards(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                let card = format!("4111{}{}", "0".repeat(11), i % 10);
                let check = Self::luhn_check_digit(&card[..15]);
                // Force a wrong check digit
                let wrong = (check + 1) % 10;
                format!("{}{}", &card[..15], wrong)
            })
            .collect()
    }

    /// Generate synthetic SSN-shaped identifiers outside the disallowed ranges
    pub fn ssns(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                let mut area = 100 + (i % 700);
                if area == 666 {
                    area = 667;
                }
                let group = 10 + (i % 89);
                let serial = 1000 + i;
                format!("{:03}-{:02}-{:04}", area, group, serial % 10000)
            })
            .collect()
    }

    /// Generate synthetic email addresses on reserved test domains
    pub fn emails(count: usize) -> Vec<String> {
        let domains = ["example.com", "test.org", "sample.net", "demo.io"];
        (0..count)
            .map(|i| format!("user{}@{}", i, domains[i % domains.len()]))
            .collect()
    }

    /// Generate synthetic NANP phone numbers in the 555 test range
    pub fn phone_numbers(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                format!(
                    "+1-{:03}-{:03}-{:04}",
                    200 + (i % 700),
                    555,
                    1000 + (i % 9000)
                )
            })
            .collect()
    }

    /// Generate synthetic secret-key-shaped API keys
    pub fn api_keys(count: usize) -> Vec<String> {
        (0..count)
            .map(|_| format!("sk_test_{}", Self::random_hex(32)))
            .collect()
    }

    /// Generate synthetic AWS-shaped access key ids
    pub fn aws_access_keys(count: usize) -> Vec<String> {
        (0..count)
            .map(|_| format!("AKIA{}", Self::random_hex(8).to_uppercase()))
            .collect()
    }

    /// Embed generated values of the requested kind into realistic text
    pub fn sample_texts(kind: &str, count: usize) -> Vec<String> {
        let (values, templates): (Vec<String>, Vec<&str>) = match kind {
            "credit_card" => (
                Self::credit_cards(count),
                vec![
                    "Payment with card: {}",
                    "CC: {}",
                    "Credit card number {} approved",
                    "Please charge card {}",
                ],
            ),
            "ssn" => (
                Self::ssns(count),
                vec![
                    "SSN: {}",
                    "Social Security Number: {}",
                    "Tax ID {}",
                    "Employee SSN {}",
                ],
            ),
            "email" => (
                Self::emails(count),
                vec!["Contact me at {}", "Email: {}", "Send to {}", "From: {}"],
            ),
            "phone" => (
                Self::phone_numbers(count),
                vec!["Call {}", "Phone: {}", "Contact number: {}", "Mobile: {}"],
            ),
            "api_key" => (
                Self::api_keys(count),
                vec!["API_KEY={}", "apiKey: '{}'", "key = '{}'", "API Key: {}"],
            ),
            _ => (Vec::new(), Vec::new()),
        };

        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| templates[i % templates.len()].replacen("{}", &value, 1))
            .collect()
    }

    fn random_hex(bytes: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..bytes)
            .map(|_| format!("{:02x}", rng.gen::<u8>()))
            .collect()
    }
}

/// Endpoint agent test fixture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFixture {
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub ip: String,
    pub os: String,
}

impl AgentFixture {
    /// Generate a random agent fixture
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let name: String = fake::faker::internet::en::Username().fake();
        Self {
            id: format!("agent-{}", crate::generate_short_id()),
            name,
            hostname: format!("host-{:04}", rng.gen_range(0..10000)),
            ip: format!("192.168.{}.{}", rng.gen_range(0..255), rng.gen_range(1..255)),
            os: ["windows", "macos", "linux"][rng.gen_range(0..3)].to_string(),
        }
    }

    /// Generate multiple agents
    pub fn generate_many(count: usize) -> Vec<Self> {
        (0..count).map(|_| Self::generate()).collect()
    }
}
