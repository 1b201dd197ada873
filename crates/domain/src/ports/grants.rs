use crate::DomainResult;
use crate::grant::Grant;

use super::BoxFuture;

pub trait GrantRepository: Send + Sync {
    fn get(&self, code: &str) -> BoxFuture<'_, DomainResult<Option<Grant>>>;

    fn insert(&self, grant: &Grant) -> BoxFuture<'_, DomainResult<Grant>>;
}
