//! In-memory host doubles for development and tests.
//!
//! [`StubSong`] is a self-contained song model with a small demo session, and
//! [`TickScheduler`] drains queued tasks on a dedicated thread the way the
//! host drains its scheduler queue once per tick. The dev binary serves the
//! stub so clients can be exercised without the real host application.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use super::model::{
    ClipDetails, ClipOverview, ClipSlotOverview, DeviceOverview, DeviceParameters, HostError,
    MasterOverview, MixerSummary, Note, ParameterInfo, PlaybackPosition, SceneOverview,
    SessionOverview, SongModel, TrackOverview,
};
use super::scheduler::{HostScheduler, ScheduledTask};

#[derive(Debug, Clone)]
struct ParamState {
    name: String,
    value: f64,
    min: f64,
    max: f64,
    enabled: bool,
}

#[derive(Debug, Clone)]
struct DeviceState {
    name: String,
    class_name: String,
    params: Vec<ParamState>,
}

impl DeviceState {
    fn new(name: &str, class_name: &str, extra_params: &[(&str, f64)]) -> Self {
        let mut params = vec![
            ParamState {
                name: String::from("Device On"),
                value: 1.0,
                min: 0.0,
                max: 1.0,
                enabled: true,
            },
            ParamState {
                name: String::from("Dry/Wet"),
                value: 1.0,
                min: 0.0,
                max: 1.0,
                enabled: true,
            },
        ];
        for (param_name, value) in extra_params {
            params.push(ParamState {
                name: String::from(*param_name),
                value: *value,
                min: 0.0,
                max: 1.0,
                enabled: true,
            });
        }
        Self {
            name: String::from(name),
            class_name: String::from(class_name),
            params,
        }
    }

    fn is_active(&self) -> bool {
        self.params.first().is_none_or(|on| on.value > 0.5)
    }

    fn overview(&self, index: usize) -> DeviceOverview {
        DeviceOverview {
            index,
            name: self.name.clone(),
            class_name: self.class_name.clone(),
            is_active: self.is_active(),
        }
    }
}

#[derive(Debug, Clone)]
struct ClipState {
    name: String,
    length: f64,
    is_midi: bool,
    is_playing: bool,
    is_recording: bool,
    looping: bool,
    loop_start: f64,
    loop_end: f64,
    notes: Vec<Note>,
}

impl ClipState {
    fn midi(name: &str, length: f64) -> Self {
        Self {
            name: String::from(name),
            length,
            is_midi: true,
            is_playing: false,
            is_recording: false,
            looping: true,
            loop_start: 0.0,
            loop_end: length,
            notes: Vec::new(),
        }
    }

    fn overview(&self) -> ClipOverview {
        ClipOverview {
            name: self.name.clone(),
            length: self.length,
            is_playing: self.is_playing,
            is_recording: self.is_recording,
        }
    }
}

#[derive(Debug, Clone)]
struct TrackState {
    name: String,
    is_midi: bool,
    mute: bool,
    solo: bool,
    arm: bool,
    volume: f64,
    panning: f64,
    slots: Vec<Option<ClipState>>,
    devices: Vec<DeviceState>,
}

impl TrackState {
    fn new(name: &str, is_midi: bool, slot_count: usize) -> Self {
        Self {
            name: String::from(name),
            is_midi,
            mute: false,
            solo: false,
            arm: false,
            volume: 0.85,
            panning: 0.0,
            slots: vec![None; slot_count],
            devices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct SceneState {
    name: String,
    color: Option<i64>,
    is_triggered: bool,
}

#[derive(Debug)]
struct SongState {
    tempo: f64,
    is_playing: bool,
    metronome: bool,
    current_song_time: f64,
    signature: (u32, u32),
    master_volume: f64,
    master_panning: f64,
    master_devices: Vec<DeviceState>,
    tracks: Vec<TrackState>,
    scenes: Vec<SceneState>,
    undo_depth: usize,
    redo_depth: usize,
}

impl SongState {
    fn record_edit(&mut self) {
        self.undo_depth += 1;
        self.redo_depth = 0;
    }

    fn track(&self, index: usize) -> Result<&TrackState, HostError> {
        let len = self.tracks.len();
        self.tracks
            .get(index)
            .ok_or(HostError::out_of_range("track", index, len))
    }

    fn track_mut(&mut self, index: usize) -> Result<&mut TrackState, HostError> {
        let len = self.tracks.len();
        self.tracks
            .get_mut(index)
            .ok_or(HostError::out_of_range("track", index, len))
    }

    fn slot_mut(
        &mut self,
        track_index: usize,
        clip_index: usize,
    ) -> Result<&mut Option<ClipState>, HostError> {
        let track = self.track_mut(track_index)?;
        let len = track.slots.len();
        track
            .slots
            .get_mut(clip_index)
            .ok_or(HostError::out_of_range("clip", clip_index, len))
    }

    fn clip_mut(
        &mut self,
        track_index: usize,
        clip_index: usize,
    ) -> Result<&mut ClipState, HostError> {
        self.slot_mut(track_index, clip_index)?
            .as_mut()
            .ok_or(HostError::EmptySlot {
                track_index,
                clip_index,
            })
    }
}

/// In-memory song model with the documented accessor surface.
///
/// Undo and redo only track edit depth; the stub does not restore previous
/// state.
#[derive(Debug)]
pub struct StubSong {
    state: Mutex<SongState>,
}

impl StubSong {
    /// Builds a small demo session: a MIDI track with an instrument, an
    /// audio track, and four empty scenes.
    #[must_use]
    pub fn demo() -> Self {
        let scene_count = 4;
        let mut lead = TrackState::new("Lead", true, scene_count);
        lead.devices.push(DeviceState::new(
            "Operator",
            "InstrumentDevice",
            &[("Filter Freq", 0.5)],
        ));
        let mut drums = TrackState::new("Drums", false, scene_count);
        drums
            .devices
            .push(DeviceState::new("Compressor", "AudioEffectDevice", &[]));

        let scenes = (0..scene_count)
            .map(|_| SceneState {
                name: String::new(),
                color: None,
                is_triggered: false,
            })
            .collect();

        Self {
            state: Mutex::new(SongState {
                tempo: 120.0,
                is_playing: false,
                metronome: false,
                current_song_time: 0.0,
                signature: (4, 4),
                master_volume: 0.85,
                master_panning: 0.0,
                master_devices: Vec::new(),
                tracks: vec![lead, drums],
                scenes,
                undo_depth: 0,
                redo_depth: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SongState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StubSong {
    fn default() -> Self {
        Self::demo()
    }
}

fn track_overview(state: &SongState, index: usize) -> Result<TrackOverview, HostError> {
    let track = state.track(index)?;
    let clip_slots = track
        .slots
        .iter()
        .enumerate()
        .map(|(slot_index, slot)| ClipSlotOverview {
            index: slot_index,
            has_clip: slot.is_some(),
            clip: slot.as_ref().map(ClipState::overview),
        })
        .collect();
    let devices = track
        .devices
        .iter()
        .enumerate()
        .map(|(device_index, device)| device.overview(device_index))
        .collect();
    Ok(TrackOverview {
        index,
        name: track.name.clone(),
        is_audio_track: !track.is_midi,
        is_midi_track: track.is_midi,
        mute: track.mute,
        solo: track.solo,
        arm: track.arm,
        volume: track.volume,
        panning: track.panning,
        clip_slots,
        devices,
    })
}

impl SongModel for StubSong {
    fn tempo(&self) -> f64 {
        self.state().tempo
    }

    fn is_playing(&self) -> bool {
        self.state().is_playing
    }

    fn metronome(&self) -> bool {
        self.state().metronome
    }

    fn track_count(&self) -> usize {
        self.state().tracks.len()
    }

    fn session_overview(&self) -> SessionOverview {
        let state = self.state();
        SessionOverview {
            tempo: state.tempo,
            signature_numerator: state.signature.0,
            signature_denominator: state.signature.1,
            track_count: state.tracks.len(),
            return_track_count: 0,
            master_track: MixerSummary {
                name: String::from("Master"),
                volume: state.master_volume,
                panning: state.master_panning,
            },
        }
    }

    fn playback_position(&self) -> PlaybackPosition {
        let state = self.state();
        PlaybackPosition {
            current_song_time: state.current_song_time,
            is_playing: state.is_playing,
            tempo: state.tempo,
            signature_numerator: state.signature.0,
            signature_denominator: state.signature.1,
        }
    }

    fn master_overview(&self) -> MasterOverview {
        let state = self.state();
        let devices: Vec<DeviceOverview> = state
            .master_devices
            .iter()
            .enumerate()
            .map(|(index, device)| device.overview(index))
            .collect();
        MasterOverview {
            name: String::from("Master"),
            volume: state.master_volume,
            panning: state.master_panning,
            device_count: devices.len(),
            devices,
        }
    }

    fn scenes(&self) -> Vec<SceneOverview> {
        self.state()
            .scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| SceneOverview {
                index,
                name: scene.name.clone(),
                color: scene.color,
                is_triggered: scene.is_triggered,
            })
            .collect()
    }

    fn track_overview(&self, track_index: usize) -> Result<TrackOverview, HostError> {
        track_overview(&self.state(), track_index)
    }

    fn clip_details(
        &self,
        track_index: usize,
        clip_index: usize,
    ) -> Result<ClipDetails, HostError> {
        let state = self.state();
        let track = state.track(track_index)?;
        let len = track.slots.len();
        let slot = track
            .slots
            .get(clip_index)
            .ok_or(HostError::out_of_range("clip", clip_index, len))?;
        let Some(clip) = slot else {
            return Ok(ClipDetails::empty(track_index, clip_index));
        };
        Ok(ClipDetails {
            track_index,
            clip_index,
            has_clip: true,
            name: Some(clip.name.clone()),
            length: Some(clip.length),
            is_midi_clip: Some(clip.is_midi),
            is_playing: Some(clip.is_playing),
            is_recording: Some(clip.is_recording),
            looping: Some(clip.looping),
            loop_start: Some(clip.loop_start),
            loop_end: Some(clip.loop_end),
        })
    }

    fn clip_notes(&self, track_index: usize, clip_index: usize) -> Result<Vec<Note>, HostError> {
        let mut state = self.state();
        let clip = state.clip_mut(track_index, clip_index)?;
        if !clip.is_midi {
            return Err(HostError::NotMidiClip {
                track_index,
                clip_index,
            });
        }
        Ok(clip.notes.clone())
    }

    fn device_parameters(
        &self,
        track_index: usize,
        device_index: usize,
    ) -> Result<DeviceParameters, HostError> {
        let state = self.state();
        let track = state.track(track_index)?;
        let len = track.devices.len();
        let device = track
            .devices
            .get(device_index)
            .ok_or(HostError::out_of_range("device", device_index, len))?;
        let parameters: Vec<ParameterInfo> = device
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| ParameterInfo {
                index,
                name: param.name.clone(),
                value: param.value,
                min: param.min,
                max: param.max,
                is_enabled: param.enabled,
            })
            .collect();
        Ok(DeviceParameters {
            track_index,
            device_index,
            device_name: device.name.clone(),
            device_class: device.class_name.clone(),
            parameter_count: parameters.len(),
            parameters,
        })
    }

    fn set_tempo(&self, tempo: f64) -> f64 {
        let mut state = self.state();
        state.tempo = tempo;
        state.record_edit();
        state.tempo
    }

    fn set_metronome(&self, enabled: bool) -> bool {
        let mut state = self.state();
        state.metronome = enabled;
        state.metronome
    }

    fn start_playback(&self) -> bool {
        let mut state = self.state();
        state.is_playing = true;
        state.is_playing
    }

    fn stop_playback(&self) -> bool {
        let mut state = self.state();
        state.is_playing = false;
        state.is_playing
    }

    fn undo(&self) -> bool {
        let mut state = self.state();
        if state.undo_depth == 0 {
            return false;
        }
        state.undo_depth -= 1;
        state.redo_depth += 1;
        true
    }

    fn redo(&self) -> bool {
        let mut state = self.state();
        if state.redo_depth == 0 {
            return false;
        }
        state.redo_depth -= 1;
        state.undo_depth += 1;
        true
    }

    fn set_track_name(&self, track_index: usize, name: &str) -> Result<String, HostError> {
        let mut state = self.state();
        state.track_mut(track_index)?.name = String::from(name);
        state.record_edit();
        Ok(String::from(name))
    }

    fn set_track_mute(&self, track_index: usize, mute: bool) -> Result<bool, HostError> {
        let mut state = self.state();
        state.track_mut(track_index)?.mute = mute;
        Ok(mute)
    }

    fn set_track_solo(&self, track_index: usize, solo: bool) -> Result<bool, HostError> {
        let mut state = self.state();
        state.track_mut(track_index)?.solo = solo;
        Ok(solo)
    }

    fn set_track_arm(&self, track_index: usize, arm: bool) -> Result<bool, HostError> {
        let mut state = self.state();
        state.track_mut(track_index)?.arm = arm;
        Ok(arm)
    }

    fn set_track_volume(&self, track_index: usize, volume: f64) -> Result<f64, HostError> {
        let mut state = self.state();
        let track = state.track_mut(track_index)?;
        track.volume = volume.clamp(0.0, 1.0);
        let applied = track.volume;
        state.record_edit();
        Ok(applied)
    }

    fn set_track_pan(&self, track_index: usize, pan: f64) -> Result<f64, HostError> {
        let mut state = self.state();
        let track = state.track_mut(track_index)?;
        track.panning = pan.clamp(-1.0, 1.0);
        let applied = track.panning;
        state.record_edit();
        Ok(applied)
    }

    fn create_midi_track(&self, index: Option<usize>) -> Result<(usize, String), HostError> {
        self.insert_track(index, true)
    }

    fn create_audio_track(&self, index: Option<usize>) -> Result<(usize, String), HostError> {
        self.insert_track(index, false)
    }

    fn delete_track(&self, track_index: usize) -> Result<String, HostError> {
        let mut state = self.state();
        state.track(track_index)?;
        let removed = state.tracks.remove(track_index);
        state.record_edit();
        Ok(removed.name)
    }

    fn create_clip(
        &self,
        track_index: usize,
        clip_index: usize,
        length: f64,
    ) -> Result<ClipOverview, HostError> {
        let mut state = self.state();
        let slot = state.slot_mut(track_index, clip_index)?;
        if slot.is_some() {
            return Err(HostError::SlotOccupied {
                track_index,
                clip_index,
            });
        }
        let clip = ClipState::midi("", length);
        let overview = clip.overview();
        *slot = Some(clip);
        state.record_edit();
        Ok(overview)
    }

    fn delete_clip(&self, track_index: usize, clip_index: usize) -> Result<String, HostError> {
        let mut state = self.state();
        let slot = state.slot_mut(track_index, clip_index)?;
        let clip = slot.take().ok_or(HostError::EmptySlot {
            track_index,
            clip_index,
        })?;
        state.record_edit();
        Ok(clip.name)
    }

    fn set_clip_name(
        &self,
        track_index: usize,
        clip_index: usize,
        name: &str,
    ) -> Result<String, HostError> {
        let mut state = self.state();
        state.clip_mut(track_index, clip_index)?.name = String::from(name);
        state.record_edit();
        Ok(String::from(name))
    }

    fn add_notes_to_clip(
        &self,
        track_index: usize,
        clip_index: usize,
        notes: &[Note],
    ) -> Result<usize, HostError> {
        let mut state = self.state();
        let clip = state.clip_mut(track_index, clip_index)?;
        if !clip.is_midi {
            return Err(HostError::NotMidiClip {
                track_index,
                clip_index,
            });
        }
        clip.notes.extend_from_slice(notes);
        state.record_edit();
        Ok(notes.len())
    }

    fn fire_clip(&self, track_index: usize, clip_index: usize) -> Result<(), HostError> {
        let mut state = self.state();
        state.clip_mut(track_index, clip_index)?.is_playing = true;
        state.is_playing = true;
        Ok(())
    }

    fn stop_clip(&self, track_index: usize, clip_index: usize) -> Result<(), HostError> {
        let mut state = self.state();
        if let Some(clip) = state.slot_mut(track_index, clip_index)?.as_mut() {
            clip.is_playing = false;
        }
        Ok(())
    }

    fn create_scene(&self, index: Option<usize>) -> Result<(usize, String), HostError> {
        let mut state = self.state();
        let len = state.scenes.len();
        let position = index.unwrap_or(len);
        if position > len {
            return Err(HostError::out_of_range("scene", position, len));
        }
        state.scenes.insert(
            position,
            SceneState {
                name: String::new(),
                color: None,
                is_triggered: false,
            },
        );
        for track in &mut state.tracks {
            track.slots.insert(position, None);
        }
        state.record_edit();
        Ok((position, String::new()))
    }

    fn delete_scene(&self, scene_index: usize) -> Result<String, HostError> {
        let mut state = self.state();
        let len = state.scenes.len();
        if scene_index >= len {
            return Err(HostError::out_of_range("scene", scene_index, len));
        }
        let removed = state.scenes.remove(scene_index);
        for track in &mut state.tracks {
            if scene_index < track.slots.len() {
                track.slots.remove(scene_index);
            }
        }
        state.record_edit();
        Ok(removed.name)
    }

    fn fire_scene(&self, scene_index: usize) -> Result<String, HostError> {
        let mut state = self.state();
        let len = state.scenes.len();
        let scene = state
            .scenes
            .get_mut(scene_index)
            .ok_or(HostError::out_of_range("scene", scene_index, len))?;
        scene.is_triggered = true;
        let name = scene.name.clone();
        for track in &mut state.tracks {
            if let Some(Some(clip)) = track.slots.get_mut(scene_index) {
                clip.is_playing = true;
            }
        }
        state.is_playing = true;
        Ok(name)
    }

    fn set_device_parameter(
        &self,
        track_index: usize,
        device_index: usize,
        parameter_index: usize,
        value: f64,
    ) -> Result<ParameterInfo, HostError> {
        let mut state = self.state();
        let track = state.track_mut(track_index)?;
        let device_count = track.devices.len();
        let device = track
            .devices
            .get_mut(device_index)
            .ok_or(HostError::out_of_range("device", device_index, device_count))?;
        let param_count = device.params.len();
        let param = device
            .params
            .get_mut(parameter_index)
            .ok_or(HostError::out_of_range(
                "parameter",
                parameter_index,
                param_count,
            ))?;
        if !param.enabled {
            return Err(HostError::ParameterDisabled {
                name: param.name.clone(),
            });
        }
        param.value = value.clamp(param.min, param.max);
        let info = ParameterInfo {
            index: parameter_index,
            name: param.name.clone(),
            value: param.value,
            min: param.min,
            max: param.max,
            is_enabled: param.enabled,
        };
        state.record_edit();
        Ok(info)
    }

    fn toggle_device(
        &self,
        track_index: usize,
        device_index: usize,
    ) -> Result<DeviceOverview, HostError> {
        let mut state = self.state();
        let track = state.track_mut(track_index)?;
        let device_count = track.devices.len();
        let device = track
            .devices
            .get_mut(device_index)
            .ok_or(HostError::out_of_range("device", device_index, device_count))?;
        if let Some(on) = device
            .params
            .first_mut()
            .filter(|param| param.name == "Device On")
        {
            on.value = if on.value > 0.5 { 0.0 } else { 1.0 };
        }
        let overview = device.overview(device_index);
        state.record_edit();
        Ok(overview)
    }
}

impl StubSong {
    fn insert_track(
        &self,
        index: Option<usize>,
        is_midi: bool,
    ) -> Result<(usize, String), HostError> {
        let mut state = self.state();
        let len = state.tracks.len();
        let position = index.unwrap_or(len);
        if position > len {
            return Err(HostError::out_of_range("track", position, len));
        }
        let slot_count = state.scenes.len();
        let name = if is_midi {
            format!("{} MIDI", position + 1)
        } else {
            format!("{} Audio", position + 1)
        };
        state
            .tracks
            .insert(position, TrackState::new(&name, is_midi, slot_count));
        state.record_edit();
        Ok((position, name))
    }
}

/// Scheduler double that runs queued tasks on a dedicated thread.
///
/// Tasks are executed in submission order, one per simulated tick, matching
/// the host's "apply on the next tick" behaviour. The worker thread is
/// joined on drop.
#[derive(Debug)]
pub struct TickScheduler {
    sender: Option<mpsc::Sender<ScheduledTask>>,
    worker: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    pending: Arc<AtomicUsize>,
}

impl TickScheduler {
    /// Starts the scheduler thread; `tick` is the artificial delay before
    /// each queued task runs.
    ///
    /// # Errors
    ///
    /// Returns the spawn error when the worker thread cannot start.
    pub fn start(tick: Duration) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<ScheduledTask>();
        let (ready_sender, ready_receiver) = mpsc::channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);
        let worker = thread::Builder::new()
            .name(String::from("host-scheduler"))
            .spawn(move || {
                let _ = ready_sender.send(thread::current().id());
                while let Ok(task) = receiver.recv() {
                    if !tick.is_zero() {
                        thread::sleep(tick);
                    }
                    task();
                    worker_pending.fetch_sub(1, Ordering::SeqCst);
                }
            })?;
        let thread_id = ready_receiver
            .recv()
            .map_err(|_| io::Error::other("scheduler thread exited before reporting ready"))?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            thread_id,
            pending,
        })
    }

    /// Tasks queued or currently running.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl HostScheduler for TickScheduler {
    fn run_async(&self, task: ScheduledTask) {
        let Some(sender) = &self.sender else {
            return;
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender.send(task).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_on_scheduler_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
