use std::{
    cell::RefCell,
    ffi::{CStr, CString, c_char, c_void},
    rc::Rc,
};

use super::uris;
use crate::urid::UridMap;
use lv2_raw::{LV2Feature, LV2Urid, LV2UridMap, LV2UridMapHandle};

pub(super) const ATOM_CAPACITY_BYTES: usize = 32768;

type Lv2WorkerStatus = u32;
const LV2_WORKER_SUCCESS: Lv2WorkerStatus = 0;
const LV2_WORKER_ERR_UNKNOWN: Lv2WorkerStatus = 1;
const LV2_OPTIONS_INSTANCE: u32 = 0;

#[repr(C)]
struct Lv2UridUnmap {
    handle: LV2UridMapHandle,
    unmap: extern "C" fn(handle: LV2UridMapHandle, urid: LV2Urid) -> *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Lv2OptionsOption {
    context: u32,
    subject: u32,
    key: u32,
    size: u32,
    type_: u32,
    value: *const c_void,
}

#[repr(C)]
struct Lv2WorkerSchedule {
    handle: *mut c_void,
    schedule_work:
        Option<unsafe extern "C" fn(handle: *mut c_void, size: u32, data: *const c_void) -> u32>,
}

pub(super) type Lv2WorkerRespondFunc =
    Option<unsafe extern "C" fn(handle: *mut c_void, size: u32, data: *const c_void) -> u32>;

#[repr(C)]
pub(super) struct Lv2WorkerInterface {
    pub work: Option<
        unsafe extern "C" fn(
            handle: *mut c_void,
            respond: Lv2WorkerRespondFunc,
            respond_handle: *mut c_void,
            size: u32,
            data: *const c_void,
        ) -> u32,
    >,
    pub work_response:
        Option<unsafe extern "C" fn(handle: *mut c_void, size: u32, data: *const c_void) -> u32>,
    pub end_run: Option<unsafe extern "C" fn(handle: *mut c_void)>,
}

/// Work requests and responses of one instance, drained after each `run`.
#[derive(Debug, Default)]
pub(super) struct WorkerQueue {
    jobs: RefCell<Vec<Vec<u8>>>,
    responses: RefCell<Vec<Vec<u8>>>,
}

impl WorkerQueue {
    pub fn take_jobs(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.jobs.borrow_mut())
    }

    pub fn take_responses(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.responses.borrow_mut())
    }

    pub fn respond_handle(&self) -> *mut c_void {
        (self as *const WorkerQueue).cast_mut().cast::<c_void>()
    }

    #[cfg(test)]
    fn push_job(&self, job: &[u8]) {
        self.jobs.borrow_mut().push(job.to_vec());
    }
}

/// Feature array handed to `instantiate`, plus everything it points at.
///
/// Must outlive the instance created with it.
pub(super) struct HostFeatures {
    _uris: Vec<CString>,
    features: Vec<LV2Feature>,
    _map: Box<LV2UridMap>,
    _unmap: Box<Lv2UridUnmap>,
    _option_values: Box<[u32; 4]>,
    _options: Vec<Lv2OptionsOption>,
    _schedule: Option<Box<Lv2WorkerSchedule>>,
    worker: Box<WorkerQueue>,
    _urids: Rc<UridMap>,
}

impl HostFeatures {
    pub fn new(urids: Rc<UridMap>, block_size: usize, with_worker: bool) -> Self {
        let handle = Rc::as_ptr(&urids).cast_mut().cast::<c_void>();
        let mut map = Box::new(LV2UridMap {
            handle,
            map: urid_map_callback,
        });
        let mut unmap = Box::new(Lv2UridUnmap {
            handle,
            unmap: urid_unmap_callback,
        });

        let block = u32::try_from(block_size).unwrap_or(u32::MAX);
        let option_values = Box::new([1_u32, block, block, ATOM_CAPACITY_BYTES as u32]);
        let int_type = urids.map(uris::ATOM_INT);
        let keys = [
            uris::BUF_SIZE_MIN_BLOCK_LENGTH,
            uris::BUF_SIZE_MAX_BLOCK_LENGTH,
            uris::BUF_SIZE_NOMINAL_BLOCK_LENGTH,
            uris::BUF_SIZE_SEQUENCE_SIZE,
        ];
        let mut options: Vec<Lv2OptionsOption> = keys
            .iter()
            .zip(option_values.iter())
            .map(|(key, value)| Lv2OptionsOption {
                context: LV2_OPTIONS_INSTANCE,
                subject: 0,
                key: urids.map(key),
                size: std::mem::size_of::<u32>() as u32,
                type_: int_type,
                value: (value as *const u32).cast::<c_void>(),
            })
            .collect();
        options.push(Lv2OptionsOption {
            context: LV2_OPTIONS_INSTANCE,
            subject: 0,
            key: 0,
            size: 0,
            type_: 0,
            value: std::ptr::null(),
        });

        let worker = Box::new(WorkerQueue::default());
        let mut schedule = with_worker.then(|| {
            Box::new(Lv2WorkerSchedule {
                handle: worker.respond_handle(),
                schedule_work: Some(lv2_worker_schedule_work_callback),
            })
        });

        let mut entries: Vec<(&str, *mut c_void)> = vec![
            (uris::URID_MAP, (&mut *map as *mut LV2UridMap).cast::<c_void>()),
            (
                uris::URID_UNMAP,
                (&mut *unmap as *mut Lv2UridUnmap).cast::<c_void>(),
            ),
            (uris::OPTIONS_OPTIONS, options.as_mut_ptr().cast::<c_void>()),
            (uris::BUF_SIZE_BOUNDED_BLOCK_LENGTH, std::ptr::null_mut()),
        ];
        if let Some(schedule) = schedule.as_mut() {
            entries.push((
                uris::WORKER_SCHEDULE,
                (&mut **schedule as *mut Lv2WorkerSchedule).cast::<c_void>(),
            ));
        }

        let mut feature_uris = Vec::with_capacity(entries.len());
        let mut features = Vec::with_capacity(entries.len());
        for (uri, data) in entries {
            // Constant URIs, no interior nul.
            let Ok(c_uri) = CString::new(uri) else {
                continue;
            };
            features.push(LV2Feature {
                uri: c_uri.as_ptr(),
                data,
            });
            feature_uris.push(c_uri);
        }

        Self {
            _uris: feature_uris,
            features,
            _map: map,
            _unmap: unmap,
            _option_values: option_values,
            _options: options,
            _schedule: schedule,
            worker,
            _urids: urids,
        }
    }

    pub fn refs(&self) -> Vec<&LV2Feature> {
        self.features.iter().collect()
    }

    pub fn provides(&self, uri: &str) -> bool {
        self.features
            .iter()
            .any(|feature| unsafe { CStr::from_ptr(feature.uri) }.to_bytes() == uri.as_bytes())
    }

    pub fn worker(&self) -> &WorkerQueue {
        &self.worker
    }
}

/// Runs queued work through `interface` until no new requests appear.
///
/// Requests scheduled from inside `work_response` are served in a later
/// round, bounded by `max_rounds`. Returns the number of requests served.
///
/// # Safety
/// `handle` must be the live instance `interface` belongs to, and `queue` the
/// queue its schedule feature feeds.
pub(super) unsafe fn drain_worker(
    interface: &Lv2WorkerInterface,
    handle: *mut c_void,
    queue: &WorkerQueue,
    max_rounds: usize,
) -> usize {
    let Some(work) = interface.work else {
        return 0;
    };
    let mut served = 0;
    for _ in 0..max_rounds {
        let jobs = queue.take_jobs();
        if jobs.is_empty() {
            break;
        }
        for job in &jobs {
            let Ok(size) = u32::try_from(job.len()) else {
                continue;
            };
            unsafe {
                work(
                    handle,
                    Some(lv2_worker_respond_callback),
                    queue.respond_handle(),
                    size,
                    job.as_ptr().cast::<c_void>(),
                );
            }
            served += 1;
        }
        let responses = queue.take_responses();
        if let Some(work_response) = interface.work_response {
            for response in &responses {
                let Ok(size) = u32::try_from(response.len()) else {
                    continue;
                };
                unsafe {
                    work_response(handle, size, response.as_ptr().cast::<c_void>());
                }
            }
        }
    }
    if let Some(end_run) = interface.end_run {
        unsafe { end_run(handle) };
    }
    served
}

fn copy_payload(size: u32, data: *const c_void) -> Vec<u8> {
    if size == 0 {
        vec![]
    } else {
        unsafe { std::slice::from_raw_parts(data.cast::<u8>(), size as usize).to_vec() }
    }
}

unsafe extern "C" fn lv2_worker_schedule_work_callback(
    handle: *mut c_void,
    size: u32,
    data: *const c_void,
) -> u32 {
    if handle.is_null() || (size > 0 && data.is_null()) {
        return LV2_WORKER_ERR_UNKNOWN;
    }
    let queue = unsafe { &*(handle as *const WorkerQueue) };
    queue.jobs.borrow_mut().push(copy_payload(size, data));
    LV2_WORKER_SUCCESS
}

unsafe extern "C" fn lv2_worker_respond_callback(
    handle: *mut c_void,
    size: u32,
    data: *const c_void,
) -> u32 {
    if handle.is_null() || (size > 0 && data.is_null()) {
        return LV2_WORKER_ERR_UNKNOWN;
    }
    let queue = unsafe { &*(handle as *const WorkerQueue) };
    queue.responses.borrow_mut().push(copy_payload(size, data));
    LV2_WORKER_SUCCESS
}

extern "C" fn urid_map_callback(handle: LV2UridMapHandle, uri: *const c_char) -> LV2Urid {
    if handle.is_null() || uri.is_null() {
        return 0;
    }
    let Ok(uri) = unsafe { CStr::from_ptr(uri) }.to_str() else {
        return 0;
    };
    let urids = unsafe { &*(handle as *const UridMap) };
    urids.map(uri)
}

extern "C" fn urid_unmap_callback(handle: LV2UridMapHandle, urid: LV2Urid) -> *const c_char {
    if handle.is_null() || urid == 0 {
        return std::ptr::null();
    }
    let urids = unsafe { &*(handle as *const UridMap) };
    urids.unmap_ptr(urid)
}
