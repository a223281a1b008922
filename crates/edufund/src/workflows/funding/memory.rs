//! Mutex-guarded in-memory stores used by the API service and the test suites.
//!
//! Each collection sits behind a single lock and every compare-and-swap happens inside one
//! acquisition of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::applications::{ApplicationFilter, ApplicationRecord, ApplicationRepository};
use super::domain::{
    ApplicationId, InterviewId, ReviewId, SponsorshipId, StudentId, VerifierId,
};
use super::interviews::{Interview, InterviewDecision, InterviewRepository, InterviewStatus};
use super::repository::{
    Notification, NotificationError, NotificationPublisher, Repositories, RepositoryError,
};
use super::sponsorship::{BindError, PoolListing, Sponsorship, SponsorshipRepository};
use super::verification::{FieldReview, FieldReviewRepository, ReviewStatus};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
}

fn check_version(expected: u64, found: u64) -> Result<(), RepositoryError> {
    if expected != found {
        return Err(RepositoryError::VersionMismatch { expected, found });
    }
    Ok(())
}

impl Repositories {
    /// Fresh, empty in-memory collections.
    pub fn in_memory() -> Self {
        Self {
            applications: Arc::new(InMemoryApplicationRepository::default()),
            reviews: Arc::new(InMemoryFieldReviewRepository::default()),
            interviews: Arc::new(InMemoryInterviewRepository::default()),
            sponsorships: Arc::new(InMemorySponsorshipRepository::default()),
        }
    }
}

#[derive(Default)]
pub struct InMemoryApplicationRepository {
    records: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        if guard
            .values()
            .any(|stored| stored.student_id == record.student_id && !stored.status.is_terminal())
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.application_id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, mut record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let stored = guard
            .get_mut(&record.application_id)
            .ok_or(RepositoryError::NotFound)?;
        check_version(record.version, stored.version)?;
        record.version += 1;
        *stored = record.clone();
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(lock(&self.records)?.get(id).cloned())
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut records: Vec<_> = guard
            .values()
            .filter(|record| filter.matches(record.status, &record.student_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.application_id.cmp(&b.application_id))
        });
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn open_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .find(|record| &record.student_id == student && !record.status.is_terminal())
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryFieldReviewRepository {
    reviews: Mutex<HashMap<ReviewId, FieldReview>>,
}

impl FieldReviewRepository for InMemoryFieldReviewRepository {
    fn insert(&self, review: FieldReview) -> Result<FieldReview, RepositoryError> {
        let mut guard = lock(&self.reviews)?;
        if guard.contains_key(&review.id)
            || guard.values().any(|stored| {
                stored.application_id == review.application_id && stored.status.is_active()
            })
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(review.id.clone(), review.clone());
        Ok(review)
    }

    fn update(&self, mut review: FieldReview) -> Result<FieldReview, RepositoryError> {
        let mut guard = lock(&self.reviews)?;
        let stored = guard.get_mut(&review.id).ok_or(RepositoryError::NotFound)?;
        if stored.status == ReviewStatus::Completed {
            return Err(RepositoryError::Conflict);
        }
        check_version(review.version, stored.version)?;
        review.version += 1;
        *stored = review.clone();
        Ok(review)
    }

    fn fetch(&self, id: &ReviewId) -> Result<Option<FieldReview>, RepositoryError> {
        Ok(lock(&self.reviews)?.get(id).cloned())
    }

    fn for_application(&self, id: &ApplicationId) -> Result<Vec<FieldReview>, RepositoryError> {
        let mut reviews: Vec<_> = lock(&self.reviews)?
            .values()
            .filter(|review| &review.application_id == id)
            .cloned()
            .collect();
        reviews.sort_by_key(|review| review.cycle);
        Ok(reviews)
    }

    fn active_for_verifier(&self, verifier: &VerifierId) -> Result<Vec<FieldReview>, RepositoryError> {
        Ok(lock(&self.reviews)?
            .values()
            .filter(|review| &review.verifier_id == verifier && review.status.is_active())
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct InterviewState {
    interviews: HashMap<InterviewId, Interview>,
    decisions: HashMap<InterviewId, Vec<InterviewDecision>>,
}

#[derive(Default)]
pub struct InMemoryInterviewRepository {
    state: Mutex<InterviewState>,
}

impl InterviewRepository for InMemoryInterviewRepository {
    fn insert(&self, interview: Interview) -> Result<Interview, RepositoryError> {
        let mut guard = lock(&self.state)?;
        if guard.interviews.contains_key(&interview.id)
            || guard.interviews.values().any(|stored| {
                stored.application_id == interview.application_id
                    && stored.status.accepts_decisions()
            })
        {
            return Err(RepositoryError::Conflict);
        }
        guard
            .interviews
            .insert(interview.id.clone(), interview.clone());
        Ok(interview)
    }

    fn update(&self, mut interview: Interview) -> Result<Interview, RepositoryError> {
        let mut guard = lock(&self.state)?;
        let stored = guard
            .interviews
            .get_mut(&interview.id)
            .ok_or(RepositoryError::NotFound)?;
        check_version(interview.version, stored.version)?;
        interview.version += 1;
        *stored = interview.clone();
        Ok(interview)
    }

    fn fetch(&self, id: &InterviewId) -> Result<Option<Interview>, RepositoryError> {
        Ok(lock(&self.state)?.interviews.get(id).cloned())
    }

    fn for_application(&self, id: &ApplicationId) -> Result<Vec<Interview>, RepositoryError> {
        let mut interviews: Vec<_> = lock(&self.state)?
            .interviews
            .values()
            .filter(|interview| &interview.application_id == id)
            .cloned()
            .collect();
        interviews.sort_by_key(|interview| interview.created_at);
        Ok(interviews)
    }

    fn append_decision(
        &self,
        decision: InterviewDecision,
        expected_version: u64,
    ) -> Result<Interview, RepositoryError> {
        let mut guard = lock(&self.state)?;
        let state = &mut *guard;
        let interview = state
            .interviews
            .get_mut(&decision.interview_id)
            .ok_or(RepositoryError::NotFound)?;
        check_version(expected_version, interview.version)?;

        let log = state
            .decisions
            .entry(decision.interview_id.clone())
            .or_default();
        if log
            .iter()
            .any(|entry| entry.panel_member_id == decision.panel_member_id)
        {
            return Err(RepositoryError::Conflict);
        }
        log.push(decision);

        if interview.status == InterviewStatus::Scheduled {
            interview.status = InterviewStatus::InProgress;
        }
        interview.version += 1;
        interview.updated_at = Utc::now();
        Ok(interview.clone())
    }

    fn decisions(&self, id: &InterviewId) -> Result<Vec<InterviewDecision>, RepositoryError> {
        Ok(lock(&self.state)?
            .decisions
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct SponsorshipState {
    records: HashMap<SponsorshipId, Sponsorship>,
    pool: HashMap<StudentId, PoolListing>,
}

impl SponsorshipState {
    fn live_for(&self, student: &StudentId) -> Option<&Sponsorship> {
        self.records
            .values()
            .find(|record| &record.student_id == student && record.is_live())
    }
}

#[derive(Default)]
pub struct InMemorySponsorshipRepository {
    state: Mutex<SponsorshipState>,
}

impl SponsorshipRepository for InMemorySponsorshipRepository {
    fn list_student(&self, listing: PoolListing) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.state)?;
        guard.pool.insert(listing.student_id.clone(), listing);
        Ok(())
    }

    fn delist_student(&self, student: &StudentId) -> Result<Option<PoolListing>, RepositoryError> {
        Ok(lock(&self.state)?.pool.remove(student))
    }

    fn listing(&self, student: &StudentId) -> Result<Option<PoolListing>, RepositoryError> {
        Ok(lock(&self.state)?.pool.get(student).cloned())
    }

    fn pool(&self, limit: usize) -> Result<Vec<PoolListing>, RepositoryError> {
        let guard = lock(&self.state)?;
        let mut listings: Vec<_> = guard.pool.values().cloned().collect();
        listings.sort_by(|a, b| {
            a.listed_at
                .cmp(&b.listed_at)
                .then_with(|| a.student_id.cmp(&b.student_id))
        });
        listings.truncate(limit);
        Ok(listings)
    }

    fn bind(&self, sponsorship: Sponsorship) -> Result<Sponsorship, BindError> {
        let mut guard = lock(&self.state)?;
        if guard.live_for(&sponsorship.student_id).is_some() {
            return Err(BindError::AlreadyBound);
        }
        let listing = guard
            .pool
            .get(&sponsorship.student_id)
            .ok_or(BindError::NotListed)?;
        if listing.outstanding_need != sponsorship.amount {
            return Err(BindError::AmountMismatch {
                expected: listing.outstanding_need,
                offered: sponsorship.amount,
            });
        }

        guard.pool.remove(&sponsorship.student_id);
        guard
            .records
            .insert(sponsorship.id.clone(), sponsorship.clone());
        Ok(sponsorship)
    }

    fn release(
        &self,
        mut sponsorship: Sponsorship,
        listing: PoolListing,
    ) -> Result<Sponsorship, RepositoryError> {
        let mut guard = lock(&self.state)?;
        let stored = guard
            .records
            .get_mut(&sponsorship.id)
            .ok_or(RepositoryError::NotFound)?;
        check_version(sponsorship.version, stored.version)?;
        sponsorship.version += 1;
        *stored = sponsorship.clone();
        guard.pool.insert(listing.student_id.clone(), listing);
        Ok(sponsorship)
    }

    fn update(&self, mut sponsorship: Sponsorship) -> Result<Sponsorship, RepositoryError> {
        let mut guard = lock(&self.state)?;
        let stored = guard
            .records
            .get_mut(&sponsorship.id)
            .ok_or(RepositoryError::NotFound)?;
        check_version(sponsorship.version, stored.version)?;
        sponsorship.version += 1;
        *stored = sponsorship.clone();
        Ok(sponsorship)
    }

    fn fetch(&self, id: &SponsorshipId) -> Result<Option<Sponsorship>, RepositoryError> {
        Ok(lock(&self.state)?.records.get(id).cloned())
    }

    fn active_for_student(&self, student: &StudentId) -> Result<Option<Sponsorship>, RepositoryError> {
        Ok(lock(&self.state)?.live_for(student).cloned())
    }
}

/// Outbox that keeps every published notification in memory.
#[derive(Default, Clone)]
pub struct InMemoryOutbox {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryOutbox {
    pub fn sent(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn templates(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|notification| notification.template)
            .collect()
    }
}

impl NotificationPublisher for InMemoryOutbox {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("outbox mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
