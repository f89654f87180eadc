//! 변경 알림 -- 구독자 fan-out 및 최근 이벤트 백로그
//!
//! [`ChangeNotifier`]는 최근 이벤트를 제한된 FIFO 백로그에 보관하고
//! 현재 구독자 모두에게 이벤트를 전달합니다.
//!
//! # 동작
//! - `broadcast`: 백로그에 추가(가득 차면 가장 오래된 것 제거) 후 구독자 호출
//! - 구독자의 에러와 panic은 잡아서 기록하고 다른 구독자에게 영향을 주지 않음
//! - `subscribe`는 [`Subscription`]을 반환하며, `unsubscribe()`로 해지
//! - `snapshot`은 백로그 사본을 오래된 순서로 반환

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use droptrack_core::metrics as m;
use parking_lot::{Mutex, RwLock};

/// 기본 백로그 크기
pub const DEFAULT_BACKLOG_SIZE: usize = 200;

/// 구독자가 반환하는 에러
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type Callback<E> = Arc<dyn Fn(&E) -> Result<(), SubscriberError> + Send + Sync>;

struct Shared<E> {
    backlog: Mutex<VecDeque<E>>,
    capacity: usize,
    subscribers: RwLock<Vec<(u64, Callback<E>)>>,
    next_id: AtomicU64,
}

/// 변경 알림기
///
/// 복제본은 같은 백로그와 구독자 목록을 공유합니다.
pub struct ChangeNotifier<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for ChangeNotifier<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Clone + Send + Sync + 'static> Default for ChangeNotifier<E> {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG_SIZE)
    }
}

impl<E: Clone + Send + Sync + 'static> ChangeNotifier<E> {
    /// 새 알림기를 생성합니다. 백로그 크기는 최소 1입니다.
    pub fn new(backlog_size: usize) -> Self {
        let capacity = backlog_size.max(1);
        Self {
            shared: Arc::new(Shared {
                backlog: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// 이벤트를 백로그에 추가하고 모든 구독자에게 전달합니다.
    ///
    /// 실패한 구독자 수를 반환합니다.
    pub fn broadcast(&self, event: E) -> usize {
        {
            let mut backlog = self.shared.backlog.lock();
            backlog.push_back(event.clone());
            while backlog.len() > self.shared.capacity {
                backlog.pop_front();
            }
        }

        let subscribers: Vec<(u64, Callback<E>)> = self.shared.subscribers.read().clone();

        let mut failed = 0;
        for (id, callback) in subscribers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(&event)));
            let reason = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            failed += 1;
            tracing::warn!(subscriber = id, reason = %reason, "subscriber failed, skipping");
            metrics::counter!(m::SUBSCRIBER_FAILURES_TOTAL).increment(1);
        }
        failed
    }

    /// 구독자를 등록합니다.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut subscribers = self.shared.subscribers.write();
            subscribers.push((id, Arc::new(callback)));
            subscribers.len()
        };
        metrics::gauge!(m::SUBSCRIBERS).set(count as f64);

        let weak: Weak<Shared<E>> = Arc::downgrade(&self.shared);
        Subscription {
            id,
            detach: Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return false;
                };
                let mut subscribers = shared.subscribers.write();
                let before = subscribers.len();
                subscribers.retain(|(sid, _)| *sid != id);
                let removed = subscribers.len() != before;
                metrics::gauge!(m::SUBSCRIBERS).set(subscribers.len() as f64);
                removed
            }),
        }
    }

    /// 백로그 사본을 오래된 순서로 반환합니다.
    pub fn snapshot(&self) -> Vec<E> {
        self.shared.backlog.lock().iter().cloned().collect()
    }

    /// 현재 구독자 수를 반환합니다.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    /// 백로그 최대 크기를 반환합니다.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// 구독 핸들
///
/// 핸들을 버려도 구독은 유지됩니다. 해지하려면 [`Subscription::unsubscribe`]를 호출합니다.
pub struct Subscription {
    id: u64,
    detach: Box<dyn Fn() -> bool + Send + Sync>,
}

impl Subscription {
    /// 구독 ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 구독을 해지합니다. 실제로 제거된 경우 `true`를 반환합니다.
    pub fn unsubscribe(&self) -> bool {
        (self.detach)()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// panic payload에서 메시지를 꺼냅니다.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
