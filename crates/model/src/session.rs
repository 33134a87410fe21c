use std::ops::{Deref, DerefMut};

use bson::oid::ObjectId;
use mongodb::ClientSession;

/// A MongoDB client session carrying the identity of the actor performing
/// the operation. Every mutating call receives it explicitly; there is no
/// default actor.
pub struct Session {
    inner: ClientSession,
    actor: ObjectId,
}

impl Session {
    pub fn new(inner: ClientSession, actor: ObjectId) -> Self {
        Session { inner, actor }
    }

    pub fn actor(&self) -> ObjectId {
        self.actor
    }
}

impl Deref for Session {
    type Target = ClientSession;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
