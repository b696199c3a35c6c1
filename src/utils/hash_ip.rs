use sha2::{Digest, Sha256};

/// Hash a reporter's IP address so no raw address is ever stored
pub fn hash_ip(ip: &str) -> String {
    let salt = std::env::var("IP_HASH_SALT").unwrap_or_else(|_| String::from("elspor_salt"));
    let salted_ip = format!("{}{}", ip, salt);

    let mut hasher = Sha256::new();
    hasher.update(salted_ip.as_bytes());
    let result = hasher.finalize();

    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_ip_hashes_the_same() {
        assert_eq!(hash_ip("10.0.0.1"), hash_ip("10.0.0.1"));
    }

    #[test]
    fn hash_does_not_contain_the_ip() {
        let hashed = hash_ip("10.0.0.1");
        assert!(!hashed.contains("10.0.0.1"));
        assert_eq!(hashed.len(), 64);
    }
}
