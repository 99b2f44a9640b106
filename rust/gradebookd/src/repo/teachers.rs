use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::db::{self, TEACHER_COLUMNS};
use crate::error::{Error, Result};
use crate::model::Teacher;
use crate::store::Store;

/// Compares the stored credential hash with the one presented at login.
pub trait CredentialVerifier {
    fn verify(&self, stored: &str, presented: &str) -> bool;
}

/// Direct equality on the precomputed hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl CredentialVerifier for ExactMatch {
    fn verify(&self, stored: &str, presented: &str) -> bool {
        stored == presented
    }
}

/// Hex SHA-256 of a PIN, as stored in `teachers.credential_hash`.
pub fn hash_credential(pin: &str) -> String {
    format!("{:x}", Sha256::digest(pin.as_bytes()))
}

pub struct TeacherRepository<'a> {
    store: &'a Store,
}

fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Teacher>> {
    let sql = format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE name = ? ORDER BY id LIMIT 1");
    Ok(conn
        .query_row(&sql, [name], db::teacher_from_row)
        .optional()?)
}

impl<'a> TeacherRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Teacher>> {
        find_by_name(self.store.conn(), name)
    }

    /// Creates a teacher account. Names are unique; a clash leaves the
    /// table untouched.
    pub fn register(&self, name: &str, school_name: &str, credential_hash: &str) -> Result<Teacher> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("name must not be empty".to_string()));
        }
        let teacher = self.store.write(|tx| {
            if find_by_name(tx, name)?.is_some() {
                return Err(Error::DuplicateAccount(name.to_string()));
            }
            tx.execute(
                "INSERT INTO teachers(name, school_name, credential_hash) VALUES(?, ?, ?)",
                (name, school_name, credential_hash),
            )?;
            let teacher = Teacher {
                id: tx.last_insert_rowid(),
                name: name.to_string(),
                school_name: school_name.to_string(),
                credential_hash: credential_hash.to_string(),
            };
            Ok((teacher, Vec::new()))
        })?;
        info!(teacher_id = teacher.id, "registered teacher");
        Ok(teacher)
    }

    pub fn login(&self, name: &str, credential_hash: &str) -> Result<Teacher> {
        self.login_with(name, credential_hash, &ExactMatch)
    }

    pub fn login_with(
        &self,
        name: &str,
        presented: &str,
        verifier: &dyn CredentialVerifier,
    ) -> Result<Teacher> {
        let teacher = self
            .find_by_name(name.trim())?
            .ok_or_else(|| Error::not_found("teacher"))?;
        if !verifier.verify(&teacher.credential_hash, presented) {
            debug!(teacher_id = teacher.id, "credential mismatch");
            return Err(Error::InvalidCredential);
        }
        Ok(teacher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        assert_eq!(
            hash_credential("1234"),
            "03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4"
        );
    }
}
