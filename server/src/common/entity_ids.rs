//! Typed ID aliases for every domain entity.

pub use super::id::{Id, V4, V7};

pub struct WorkItem;
pub struct Job;
pub struct OutboxMessage;
pub struct Memory;
pub struct Note;
pub struct Contact;
pub struct Communication;
pub struct NamespaceGrant;

pub type WorkItemId = Id<WorkItem>;
pub type JobId = Id<Job>;
pub type OutboxMessageId = Id<OutboxMessage>;
pub type MemoryId = Id<Memory>;
pub type NoteId = Id<Note>;
pub type ContactId = Id<Contact>;
pub type CommunicationId = Id<Communication>;
pub type NamespaceGrantId = Id<NamespaceGrant>;
